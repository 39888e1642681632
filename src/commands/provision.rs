use clap::Args;

use foreman::provision::{self, ProvisionReport};

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct ProvisionArgs {}

pub fn run(_args: ProvisionArgs, global: &GlobalArgs) -> CmdResult<ProvisionReport> {
    let ws = Workspace::load(global)?;
    let store = ws.cache_store()?;
    let report = provision::run(&ws.config, ws.root(), &store, ws.runner.as_ref())?;
    Ok((report, 0))
}

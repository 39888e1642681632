use clap::Args;

use foreman::deploy::{self, DeployReport};

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct DeployArgs {
    /// Deploy target name (e.g. deploy-dev)
    pub target: String,
}

pub fn run(args: DeployArgs, global: &GlobalArgs) -> CmdResult<DeployReport> {
    let ws = Workspace::load(global)?;
    let git_ref = ws.git_ref(global);
    let target = deploy::find(&ws.config.deploy, &args.target)?;
    let report = deploy::run(target, ws.root(), &git_ref, ws.runner.as_ref())?;
    Ok((report, 0))
}

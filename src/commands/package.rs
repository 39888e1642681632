use clap::Args;

use foreman::release::{self, ReleaseOutcome};

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct PackageArgs {
    /// Build the archive without uploading it
    #[arg(long)]
    pub no_upload: bool,
}

pub fn run(args: PackageArgs, global: &GlobalArgs) -> CmdResult<ReleaseOutcome> {
    let mut ws = Workspace::load(global)?;
    if args.no_upload {
        ws.config.package.upload = None;
    }
    let git_ref = ws.git_ref(global);
    let outcome = release::run(&ws.config.package, ws.root(), &git_ref, ws.runner.as_ref())?;
    Ok((outcome, 0))
}

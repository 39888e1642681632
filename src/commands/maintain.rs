use clap::{Args, Subcommand};

use foreman::maintenance::{dependencies, locales, GitHubClient, MaintenanceContext, MaintenanceOutcome};
use foreman::paths;
use foreman::schedule::ScheduledJobKind;

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct MaintainArgs {
    #[command(subcommand)]
    command: MaintainCommand,
}

#[derive(Subcommand)]
enum MaintainCommand {
    /// Recompile the dependency lock and open or update its pull request
    Dependencies,
    /// Pull translations and open or update their pull request
    Locales,
}

pub fn run(args: MaintainArgs, global: &GlobalArgs) -> CmdResult<MaintenanceOutcome> {
    let ws = Workspace::load(global)?;
    let kind = match args.command {
        MaintainCommand::Dependencies => ScheduledJobKind::Dependencies,
        MaintainCommand::Locales => ScheduledJobKind::Locales,
    };
    Ok((run_job(&ws, kind)?, 0))
}

/// Run one maintenance job against the workspace with the GitHub client
/// and the shared lock directory.
pub(crate) fn run_job(ws: &Workspace, kind: ScheduledJobKind) -> foreman::Result<MaintenanceOutcome> {
    let config = &ws.config.maintenance;
    let host = GitHubClient::from_config(config);
    let ctx = MaintenanceContext {
        root: ws.root(),
        config,
        runner: ws.runner.as_ref(),
        host: &host,
        lock_dir: paths::locks()?,
    };

    match kind {
        ScheduledJobKind::Dependencies => dependencies::run(&ctx, &config.dependencies),
        ScheduledJobKind::Locales => locales::run(&ctx, &config.locales),
    }
}


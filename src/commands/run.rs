use std::sync::Arc;

use clap::Args;

use foreman::workflow::{self, WorkflowRun};

use super::{exit_code_for_step_code, CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct RunArgs {}

pub fn run(_args: RunArgs, global: &GlobalArgs) -> CmdResult<WorkflowRun> {
    let ws = Workspace::load(global)?;
    let git_ref = ws.git_ref(global);
    let store = Arc::new(ws.cache_store()?);

    let report = workflow::run(
        &ws.config,
        ws.root.clone(),
        &git_ref,
        ws.runner.clone(),
        store,
    )?;

    let exit_code = report
        .result
        .first_failure()
        .and_then(|step| step.error.as_ref())
        .map(|error| exit_code_for_step_code(&error.code))
        .unwrap_or(0);

    Ok((report, exit_code))
}

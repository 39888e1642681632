use clap::Args;

use foreman::workflow::{self, WorkflowPlan};

use super::{CmdResult, GlobalArgs, Workspace};

#[derive(Args)]
pub struct PlanArgs {}

pub fn run(_args: PlanArgs, global: &GlobalArgs) -> CmdResult<WorkflowPlan> {
    let ws = Workspace::load(global)?;
    let git_ref = ws.git_ref(global);
    Ok((workflow::plan(&ws.config, &git_ref)?, 0))
}

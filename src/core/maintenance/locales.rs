//! Nightly translation sync.

use super::{run_job, JobDefinition, MaintenanceContext, MaintenanceOutcome};
use crate::config::LocaleJobConfig;
use crate::error::Result;
use crate::utils::template::{self, TemplateVars};

pub const JOB_NAME: &str = "locales";

/// Translation client command with the capped worker count filled in.
pub fn pull_command(job: &LocaleJobConfig) -> String {
    let workers = job.effective_workers().to_string();
    template::render(&job.command, &[(TemplateVars::WORKERS, &workers)])
}

pub fn run(ctx: &MaintenanceContext, job: &LocaleJobConfig) -> Result<MaintenanceOutcome> {
    let definition = JobDefinition {
        name: JOB_NAME,
        branch: &job.branch,
        paths: vec![job.locale_dir.clone()],
        commit_message: &job.commit_message,
        pull_request: &job.pull_request,
    };

    let command = pull_command(job);
    run_job(ctx, &definition, |ctx| {
        ctx.run_command(JOB_NAME, &command)?;
        Ok(Vec::new())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;

    #[test]
    fn default_command_forces_and_uses_four_workers() {
        let job = WorkflowConfig::default().maintenance.locales;
        assert_eq!(pull_command(&job), "tx pull --all --force --workers 4");
    }

    #[test]
    fn worker_count_is_capped() {
        let mut job = WorkflowConfig::default().maintenance.locales;
        job.workers = 100;
        assert_eq!(pull_command(&job), "tx pull --all --force --workers 16");
    }
}

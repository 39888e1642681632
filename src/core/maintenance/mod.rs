//! Scheduled maintenance jobs that publish regenerated files as a pull
//! request from a fixed bot branch.
//!
//! Every job follows the same sequence: take the run lock, read the remote
//! tip, reset the bot branch from the base branch, apply the job's
//! transformation, stage its paths, and stop with [`MaintenanceOutcome::NoChanges`]
//! when nothing is staged. Otherwise commit, publish with compare-and-swap
//! and open or reuse the pull request.

mod branch;
pub mod dependencies;
mod lock;
pub mod locales;
mod pull_request;

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Serialize;

use crate::config::{MaintenanceConfig, PullRequestTemplate};
use crate::error::{Error, Result};
use crate::git::Git;
use crate::runner::{CommandRunner, CommandSpec};

pub use branch::{commit, publish, reset, stage, PublishOutcome};
pub use lock::{JobLock, LockInfo};
pub use pull_request::{ensure, GitHubClient, PullRequest, PullRequestHost, PullRequestOutcome};

/// Longest lock lifetime accepted from configuration (30 days).
const MAX_LOCK_TTL_MINUTES: u64 = 60 * 24 * 30;

/// Shared collaborators for a maintenance run.
pub struct MaintenanceContext<'a> {
    pub root: &'a Path,
    pub config: &'a MaintenanceConfig,
    pub runner: &'a dyn CommandRunner,
    pub host: &'a dyn PullRequestHost,
    pub lock_dir: PathBuf,
}

impl<'a> MaintenanceContext<'a> {
    pub fn git(&self) -> Git<'a> {
        Git::new(self.runner, self.root)
    }

    fn lock_ttl(&self) -> Duration {
        let minutes = self.config.lock_ttl_minutes.clamp(1, MAX_LOCK_TTL_MINUTES);
        Duration::minutes(minutes as i64)
    }

    /// Run a shell command in the workspace; failure aborts the job.
    pub fn run_command(&self, job: &str, command: &str) -> Result<()> {
        let spec = CommandSpec::shell(command).in_dir(self.root);
        log_status!("maintain", "[{}] $ {}", job, command);
        let out = self.runner.run(&spec);
        if !out.success {
            return Err(Error::maintenance_command_failed(job, out.failure_details(&spec)));
        }
        Ok(())
    }
}

/// Fixed parameters of one job.
pub struct JobDefinition<'a> {
    pub name: &'a str,
    pub branch: &'a str,
    pub paths: Vec<String>,
    pub commit_message: &'a str,
    pub pull_request: &'a PullRequestTemplate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MaintenanceOutcome {
    NoChanges {
        job: String,
        branch: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
    },
    Published {
        job: String,
        branch: String,
        commit: String,
        publish: PublishOutcome,
        pull_request: PullRequestOutcome,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        notes: Vec<String>,
    },
}

/// Drive one job through the shared sequence. `transform` edits the working
/// tree after the reset and returns notes for the report.
pub fn run_job<F>(ctx: &MaintenanceContext, job: &JobDefinition, transform: F) -> Result<MaintenanceOutcome>
where
    F: FnOnce(&MaintenanceContext) -> Result<Vec<String>>,
{
    let _lock = JobLock::acquire(&ctx.lock_dir, job.name, ctx.lock_ttl())?;
    let git = ctx.git();
    let remote = ctx.config.remote.as_str();

    let tip = git.remote_tip(remote, job.branch)?;
    reset(&git, remote, &ctx.config.base, job.branch)?;

    let notes = transform(ctx)?;

    stage(&git, &job.paths)?;
    if !git.has_staged_changes()? {
        log_status!("maintain", "[{}] nothing to commit", job.name);
        return Ok(MaintenanceOutcome::NoChanges {
            job: job.name.to_string(),
            branch: job.branch.to_string(),
            notes,
        });
    }

    let commit_id = commit(&git, &ctx.config.author, job.commit_message)?;
    let published = publish(&git, remote, job.branch, tip.as_deref())?;
    let pull_request = ensure(ctx.host, job.branch, &ctx.config.base, job.pull_request)?;

    Ok(MaintenanceOutcome::Published {
        job: job.name.to_string(),
        branch: job.branch.to_string(),
        commit: commit_id,
        publish: published,
        pull_request,
        notes,
    })
}

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;

use foreman::maintenance::MaintenanceOutcome;
use foreman::paths;
use foreman::schedule::{self, ScheduleState, ScheduledJobKind, ScheduledJobStatus};

use super::{maintain, CmdResult, GlobalArgs, Workspace};
use crate::output::exit_code_for_error;

#[derive(Args)]
pub struct ScheduleArgs {
    #[command(subcommand)]
    command: ScheduleCommand,
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Show each scheduled job with its last and next run
    List,
    /// Run every job whose schedule fired since its last run
    Tick {
        /// Report due jobs without running them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickResult {
    pub job: ScheduledJobKind,
    pub fired_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MaintenanceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TickError>,
}

#[derive(Debug, Serialize)]
pub struct TickError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScheduleOutput {
    List {
        command: String,
        jobs: Vec<ScheduledJobStatus>,
    },
    Tick {
        command: String,
        #[serde(rename = "dryRun")]
        dry_run: bool,
        results: Vec<TickResult>,
    },
}

pub fn run(args: ScheduleArgs, global: &GlobalArgs) -> CmdResult<ScheduleOutput> {
    let ws = Workspace::load(global)?;
    let state_path = paths::schedule_state()?;
    let jobs = schedule::scheduled_jobs(&ws.config);
    let now = Utc::now();

    match args.command {
        ScheduleCommand::List => {
            let state = ScheduleState::load(&state_path)?;
            Ok((
                ScheduleOutput::List {
                    command: "schedule.list".to_string(),
                    jobs: schedule::status(&jobs, &state, now)?,
                },
                0,
            ))
        }
        ScheduleCommand::Tick { dry_run } => {
            let mut results = Vec::new();
            let mut exit_code = 0;

            if dry_run {
                let state = ScheduleState::load(&state_path)?;
                for (job, fired_at) in schedule::due_jobs(&jobs, &state, now)? {
                    results.push(TickResult {
                        job,
                        fired_at,
                        outcome: None,
                        error: None,
                    });
                }
            } else {
                let runs = schedule::tick(&jobs, &state_path, now, |job| maintain::run_job(&ws, job))?;
                for run in runs {
                    let (outcome, error) = match run.result {
                        Ok(outcome) => (Some(outcome), None),
                        Err(err) => {
                            if exit_code == 0 {
                                exit_code = exit_code_for_error(err.code);
                            }
                            let error = TickError {
                                code: err.code.as_str().to_string(),
                                message: err.message,
                            };
                            (None, Some(error))
                        }
                    };
                    results.push(TickResult {
                        job: run.job,
                        fired_at: run.fired_at,
                        outcome,
                        error,
                    });
                }
            }

            Ok((
                ScheduleOutput::Tick {
                    command: "schedule.tick".to_string(),
                    dry_run,
                    results,
                },
                exit_code,
            ))
        }
    }
}

//! Cron schedules for the maintenance jobs.
//!
//! Expressions are accepted in the classic five-field form
//! (`min hour dom mon dow`, Sunday = 0) and normalized to the six-field,
//! seconds-first form the `cron` crate evaluates. All times are UTC.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::utils::io;

/// How far back a job that has never run looks for a missed fire time.
pub const DEFAULT_CATCHUP_HOURS: i64 = 24;

const WEEKDAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledJobKind {
    Dependencies,
    Locales,
}

impl ScheduledJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledJobKind::Dependencies => "dependencies",
            ScheduledJobKind::Locales => "locales",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub kind: ScheduledJobKind,
    pub expression: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJobStatus {
    pub job: ScheduledJobKind,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

/// Persisted last-run times, keyed by job name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleState {
    #[serde(default)]
    pub last_runs: BTreeMap<String, DateTime<Utc>>,
}

impl ScheduleState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = io::read_file(path, "read schedule state")?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::internal_json(e.to_string(), Some("parse schedule state".to_string()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize schedule state".to_string()))
        })?;
        io::write_file_atomic(path, &raw, "write schedule state")
    }

    pub fn last_run(&self, job: ScheduledJobKind) -> Option<DateTime<Utc>> {
        self.last_runs.get(job.as_str()).copied()
    }

    pub fn record(&mut self, job: ScheduledJobKind, at: DateTime<Utc>) {
        self.last_runs.insert(job.as_str().to_string(), at);
    }
}

pub fn scheduled_jobs(config: &WorkflowConfig) -> Vec<ScheduledJob> {
    vec![
        ScheduledJob {
            kind: ScheduledJobKind::Dependencies,
            expression: config.maintenance.dependencies.schedule.clone(),
        },
        ScheduledJob {
            kind: ScheduledJobKind::Locales,
            expression: config.maintenance.locales.schedule.clone(),
        },
    ]
}

/// Convert a five-field expression to the six-field form; six- and
/// seven-field expressions pass through unchanged.
pub fn normalize(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let dow = normalize_weekdays(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], dow
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(Error::validation_invalid_argument(
            "schedule",
            format!("Expected 5 cron fields, got {}", n),
            Some(expression.to_string()),
            None,
        )),
    }
}

/// Numeric weekdays use Sunday = 0 (or 7); the cron crate counts from
/// Sunday = 1, so numbers are rewritten to names.
fn normalize_weekdays(field: &str) -> Result<String> {
    let convert = |token: &str| -> Result<String> {
        match token.parse::<usize>() {
            Ok(n) if n < WEEKDAY_NAMES.len() => Ok(WEEKDAY_NAMES[n].to_string()),
            Ok(_) => Err(Error::validation_invalid_argument(
                "schedule",
                format!("Day of week out of range: {}", token),
                Some(field.to_string()),
                None,
            )),
            Err(_) => Ok(token.to_string()),
        }
    };

    let mut parts = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let range = match range.split_once('-') {
            Some((start, end)) => format!("{}-{}", convert(start)?, convert(end)?),
            None => convert(range)?,
        };
        parts.push(match step {
            Some(step) => format!("{}/{}", range, step),
            None => range,
        });
    }
    Ok(parts.join(","))
}

pub fn parse(expression: &str) -> Result<Schedule> {
    let normalized = normalize(expression)?;
    Schedule::from_str(&normalized).map_err(|e| {
        Error::validation_invalid_argument(
            "schedule",
            format!("Invalid cron expression '{}': {}", expression, e),
            Some(expression.to_string()),
            None,
        )
    })
}

pub fn next_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Latest fire time in `(since, now]`, if any.
pub fn latest_due(
    schedule: &Schedule,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    schedule.after(&since).take_while(|t| *t <= now).last()
}

/// Jobs with a fire time between their last run and `now`.
pub fn due_jobs(
    jobs: &[ScheduledJob],
    state: &ScheduleState,
    now: DateTime<Utc>,
) -> Result<Vec<(ScheduledJobKind, DateTime<Utc>)>> {
    let mut due = Vec::new();
    for job in jobs {
        let schedule = parse(&job.expression)?;
        let since = state
            .last_run(job.kind)
            .unwrap_or_else(|| now - Duration::hours(DEFAULT_CATCHUP_HOURS));
        if let Some(fire) = latest_due(&schedule, since, now) {
            due.push((job.kind, fire));
        }
    }
    Ok(due)
}

/// A due job and the result of running it.
#[derive(Debug)]
pub struct TickRun<T> {
    pub job: ScheduledJobKind,
    pub fired_at: DateTime<Utc>,
    pub result: Result<T>,
}

/// Run every job due at `now` once. The attempt is recorded and saved
/// before the job runs, so a failed job waits for its next fire time or a
/// manual restart.
pub fn tick<T, F>(
    jobs: &[ScheduledJob],
    state_path: &Path,
    now: DateTime<Utc>,
    mut run: F,
) -> Result<Vec<TickRun<T>>>
where
    F: FnMut(ScheduledJobKind) -> Result<T>,
{
    let mut state = ScheduleState::load(state_path)?;
    let mut runs = Vec::new();
    for (job, fired_at) in due_jobs(jobs, &state, now)? {
        state.record(job, now);
        state.save(state_path)?;
        runs.push(TickRun {
            job,
            fired_at,
            result: run(job),
        });
    }
    Ok(runs)
}

pub fn status(
    jobs: &[ScheduledJob],
    state: &ScheduleState,
    now: DateTime<Utc>,
) -> Result<Vec<ScheduledJobStatus>> {
    jobs.iter()
        .map(|job| {
            let schedule = parse(&job.expression)?;
            Ok(ScheduledJobStatus {
                job: job.kind,
                expression: job.expression.clone(),
                last_run: state.last_run(job.kind),
                next_run: next_after(&schedule, now),
            })
        })
        .collect()
}

//! Job graph execution.
//!
//! Steps declare the steps they `need`. Ordering is topological; steps
//! whose needs all succeeded run together, one thread per step. A step whose
//! dependency failed, was skipped or is missing never executes and is
//! reported `skipped`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Hint, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    #[serde(rename = "provision")]
    Provision,
    #[serde(rename = "verify")]
    Verify,
    #[serde(rename = "package")]
    Package,
    #[serde(rename = "messages.push")]
    MessagesPush,
    #[serde(rename = "deploy")]
    Deploy,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Provision => "provision",
            StepKind::Verify => "verify",
            StepKind::Package => "package",
            StepKind::MessagesPush => "messages.push",
            StepKind::Deploy => "deploy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl PipelineStep {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            needs: Vec::new(),
            config: BTreeMap::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn needs(mut self, id: impl Into<String>) -> Self {
        self.needs.push(id.into());
        self
    }

    pub fn with_config(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlan {
    pub steps: Vec<PipelinePlanStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlanStep {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,
    pub status: PipelineStepStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStepStatus {
    Ready,
    Missing,
}

/// Decides whether a step has everything it needs to execute.
pub trait PipelineCapabilityResolver: Send + Sync {
    /// Configuration keys the step lacks; empty when it can run.
    fn missing(&self, step: &PipelineStep) -> Vec<String>;
}

pub trait PipelineStepExecutor: Send + Sync {
    fn execute_step(&self, step: &PipelineStep) -> Result<StepOutput>;
}

/// What an executor hands back for a step that completed.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub data: Option<serde_json::Value>,
    pub warnings: Vec<String>,
}

impl StepOutput {
    pub fn data<T: Serialize>(value: &T) -> Result<Self> {
        let data = serde_json::to_value(value)
            .map_err(|e| Error::internal_json(e.to_string(), Some("step output".to_string())))?;
        Ok(Self {
            data: Some(data),
            warnings: Vec::new(),
        })
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStepResult {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub status: PipelineRunStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

impl PipelineStepResult {
    fn bare(step: &PipelineStep, status: PipelineRunStatus) -> Self {
        Self {
            id: step.id.clone(),
            kind: step.kind,
            status,
            missing: Vec::new(),
            warnings: Vec::new(),
            hints: Vec::new(),
            data: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    pub steps: Vec<PipelineStepResult>,
    pub status: PipelineRunStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub summary: PipelineRunSummary,
}

impl PipelineRunResult {
    /// First failed step in execution order.
    pub fn first_failure(&self) -> Option<&PipelineStepResult> {
        self.steps
            .iter()
            .find(|r| r.status == PipelineRunStatus::Failed)
    }

    pub fn step(&self, id: &str) -> Option<&PipelineStepResult> {
        self.steps.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub missing: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    PartialSuccess,
    Failed,
    Skipped,
    Missing,
}

pub fn plan(steps: &[PipelineStep], resolver: &dyn PipelineCapabilityResolver) -> Result<PipelinePlan> {
    let (ordered, warnings) = order_steps(steps)?;
    let planned = ordered
        .into_iter()
        .map(|step| {
            let missing = resolver.missing(&step);
            let status = if missing.is_empty() {
                PipelineStepStatus::Ready
            } else {
                PipelineStepStatus::Missing
            };
            PipelinePlanStep {
                id: step.id,
                kind: step.kind,
                label: step.label,
                needs: step.needs,
                status,
                missing,
            }
        })
        .collect();

    Ok(PipelinePlan {
        steps: planned,
        warnings,
    })
}

fn order_steps(steps: &[PipelineStep]) -> Result<(Vec<PipelineStep>, Vec<String>)> {
    let mut id_index = HashMap::new();
    for (idx, step) in steps.iter().enumerate() {
        if id_index.insert(step.id.clone(), idx).is_some() {
            return Err(Error::validation_invalid_argument(
                "pipeline",
                format!("Duplicate step id '{}'", step.id),
                None,
                None,
            ));
        }
    }

    let mut indegree = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];

    for (idx, step) in steps.iter().enumerate() {
        for need in &step.needs {
            let Some(&parent) = id_index.get(need) else {
                return Err(Error::validation_invalid_argument(
                    "pipeline",
                    format!("Step '{}' depends on unknown step '{}'", step.id, need),
                    None,
                    None,
                ));
            };
            indegree[idx] += 1;
            dependents[parent].push(idx);
        }
    }

    let mut queue: VecDeque<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| idx)
        .collect();

    let mut ordered = Vec::with_capacity(steps.len());
    while let Some(idx) = queue.pop_front() {
        ordered.push(steps[idx].clone());
        for &child in &dependents[idx] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if ordered.len() != steps.len() {
        let pending: Vec<String> = steps
            .iter()
            .enumerate()
            .filter(|(idx, _)| indegree[*idx] > 0)
            .map(|(_, step)| step.id.clone())
            .collect();
        return Err(Error::validation_invalid_argument(
            "pipeline",
            "Steps contain a cycle",
            None,
            Some(pending),
        ));
    }

    let mut warnings = Vec::new();
    let reordered = ordered.iter().zip(steps).any(|(a, b)| a.id != b.id);
    if reordered {
        warnings.push("Steps reordered based on dependencies".to_string());
    }

    Ok((ordered, warnings))
}

pub fn run(
    steps: &[PipelineStep],
    executor: Arc<dyn PipelineStepExecutor>,
    resolver: Arc<dyn PipelineCapabilityResolver>,
) -> Result<PipelineRunResult> {
    let (ordered, warnings) = order_steps(steps)?;
    let mut results: Vec<PipelineStepResult> = Vec::with_capacity(ordered.len());
    let mut pending: Vec<PipelineStep> = Vec::new();

    for step in ordered {
        let missing = resolver.missing(&step);
        if missing.is_empty() {
            pending.push(step);
        } else {
            log_status!("pipeline", "{} is missing: {}", step.id, missing.join(", "));
            let mut result = PipelineStepResult::bare(&step, PipelineRunStatus::Missing);
            result.missing = missing;
            results.push(result);
        }
    }

    while !pending.is_empty() {
        let (ready, blocked, skipped) = split_ready_steps(&pending, &results);
        results.extend(skipped);

        if ready.is_empty() {
            if blocked.is_empty() {
                break;
            }
            return Err(Error::internal_unexpected(format!(
                "Steps blocked without runnable dependencies: {}",
                blocked
                    .iter()
                    .map(|s| s.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        results.extend(execute_batch(&ready, Arc::clone(&executor))?);
        pending = blocked;
    }

    let status = derive_overall_status(&results);
    let summary = build_summary(&results, status);

    Ok(PipelineRunResult {
        steps: results,
        status,
        warnings,
        summary,
    })
}

fn split_ready_steps(
    pending: &[PipelineStep],
    results: &[PipelineStepResult],
) -> (Vec<PipelineStep>, Vec<PipelineStep>, Vec<PipelineStepResult>) {
    let mut ready = Vec::new();
    let mut blocked = Vec::new();
    let mut skipped = Vec::new();

    let mut status_map: HashMap<String, PipelineRunStatus> = results
        .iter()
        .map(|result| (result.id.clone(), result.status))
        .collect();

    for step in pending {
        let mut unmet = false;
        let mut failed_dependency: Option<&str> = None;

        for need in &step.needs {
            match status_map.get(need) {
                Some(PipelineRunStatus::Success) | Some(PipelineRunStatus::PartialSuccess) => {}
                Some(_) => {
                    failed_dependency = Some(need.as_str());
                    break;
                }
                None => unmet = true,
            }
        }

        if let Some(dep) = failed_dependency {
            log_status!("pipeline", "{} skipped ('{}' did not succeed)", step.id, dep);
            let mut result = PipelineStepResult::bare(step, PipelineRunStatus::Skipped);
            result
                .warnings
                .push(format!("Skipped because '{}' did not succeed", dep));
            status_map.insert(step.id.clone(), PipelineRunStatus::Skipped);
            skipped.push(result);
        } else if unmet {
            blocked.push(step.clone());
        } else {
            ready.push(step.clone());
        }
    }

    (ready, blocked, skipped)
}

fn derive_overall_status(results: &[PipelineStepResult]) -> PipelineRunStatus {
    let count = |status: PipelineRunStatus| results.iter().filter(|r| r.status == status).count();

    if count(PipelineRunStatus::Failed) > 0 {
        return PipelineRunStatus::Failed;
    }
    let succeeded = count(PipelineRunStatus::Success);
    if count(PipelineRunStatus::Missing) > 0 {
        return if succeeded > 0 {
            PipelineRunStatus::PartialSuccess
        } else {
            PipelineRunStatus::Missing
        };
    }
    if succeeded == 0 && !results.is_empty() {
        return PipelineRunStatus::Skipped;
    }
    PipelineRunStatus::Success
}

fn build_summary(results: &[PipelineStepResult], status: PipelineRunStatus) -> PipelineRunSummary {
    let count = |status: PipelineRunStatus| results.iter().filter(|r| r.status == status).count();

    let next_actions = match status {
        PipelineRunStatus::Failed => {
            vec!["Fix the failing step and re-run; completed steps are safe to repeat".to_string()]
        }
        PipelineRunStatus::Missing | PipelineRunStatus::PartialSuccess => {
            vec!["Add the missing configuration to foreman.yml".to_string()]
        }
        _ => Vec::new(),
    };

    PipelineRunSummary {
        total_steps: results.len(),
        succeeded: count(PipelineRunStatus::Success),
        failed: count(PipelineRunStatus::Failed),
        skipped: count(PipelineRunStatus::Skipped),
        missing: count(PipelineRunStatus::Missing),
        next_actions,
    }
}

fn execute_batch(
    steps: &[PipelineStep],
    executor: Arc<dyn PipelineStepExecutor>,
) -> Result<Vec<PipelineStepResult>> {
    if let [step] = steps {
        return Ok(vec![execute_single_step(step.clone(), executor.as_ref())]);
    }

    let handles: Vec<_> = steps
        .iter()
        .map(|step| {
            let step = step.clone();
            let executor = Arc::clone(&executor);
            thread::spawn(move || execute_single_step(step, executor.as_ref()))
        })
        .collect();

    let mut results = Vec::with_capacity(steps.len());
    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| Error::internal_unexpected("Step execution thread panicked"))?;
        results.push(result);
    }

    Ok(results)
}

fn execute_single_step(step: PipelineStep, executor: &dyn PipelineStepExecutor) -> PipelineStepResult {
    log_status!("pipeline", "Running {}", step.id);

    match executor.execute_step(&step) {
        Ok(output) => {
            let mut result = PipelineStepResult::bare(&step, PipelineRunStatus::Success);
            result.data = output.data;
            result.warnings = output.warnings;
            result
        }
        Err(err) => {
            log_status!("pipeline", "{} failed: {}", step.id, err.message);
            let mut result = PipelineStepResult::bare(&step, PipelineRunStatus::Failed);
            result.hints = err.hints.clone();
            result.error = Some(StepError {
                code: err.code.as_str().to_string(),
                message: err.message,
                details: err.details,
            });
            result
        }
    }
}

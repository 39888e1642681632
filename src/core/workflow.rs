//! The branch pipeline: provision, verify, then package, message push and
//! deploys, each gated on the ref being built.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::cache::CacheStore;
use crate::config::WorkflowConfig;
use crate::deploy;
use crate::error::{Error, Result};
use crate::git::GitRef;
use crate::pipeline::{
    self, PipelineCapabilityResolver, PipelinePlan, PipelineRunResult, PipelineStep,
    PipelineStepExecutor, StepKind, StepOutput,
};
use crate::provision;
use crate::release;
use crate::runner::{CommandRunner, CommandSpec};
use crate::verify;

pub const PROVISION: &str = "provision";
pub const VERIFY: &str = "verify";
pub const PACKAGE: &str = "package";
pub const MESSAGES_PUSH: &str = "messages.push";

/// A job left out of the graph because the ref does not enable it.
#[derive(Debug, Clone, Serialize)]
pub struct FilteredJob {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPlan {
    #[serde(rename = "ref")]
    pub git_ref: GitRef,
    #[serde(flatten)]
    pub plan: PipelinePlan,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filtered: Vec<FilteredJob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    #[serde(rename = "ref")]
    pub git_ref: GitRef,
    #[serde(flatten)]
    pub result: PipelineRunResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filtered: Vec<FilteredJob>,
}

fn matches_any(patterns: &[String], git_ref: &GitRef) -> bool {
    git_ref
        .branch
        .as_deref()
        .map(|b| patterns.iter().any(|p| glob_match::glob_match(p, b)))
        .unwrap_or(false)
}

/// Job graph for a ref. Packaging always joins the graph and decides at run
/// time; message push and deploys only join on their branches.
pub fn build_steps(config: &WorkflowConfig, git_ref: &GitRef) -> (Vec<PipelineStep>, Vec<FilteredJob>) {
    let mut steps = vec![
        PipelineStep::new(PROVISION, StepKind::Provision).label("Restore cache and sync environment"),
        PipelineStep::new(VERIFY, StepKind::Verify)
            .label("Drift checks and tests")
            .needs(PROVISION),
        PipelineStep::new(PACKAGE, StepKind::Package)
            .label("Build and upload release archive")
            .needs(VERIFY),
    ];
    let mut filtered = Vec::new();

    if matches_any(&config.messages.branches, git_ref) {
        steps.push(
            PipelineStep::new(MESSAGES_PUSH, StepKind::MessagesPush)
                .label("Push source messages")
                .needs(VERIFY),
        );
    } else {
        filtered.push(FilteredJob {
            id: MESSAGES_PUSH.to_string(),
            reason: format!("runs on {}", config.messages.branches.join(", ")),
        });
    }

    let enabled = deploy::targets_for(&config.deploy, git_ref);
    for target in &config.deploy {
        if enabled.iter().any(|t| t.name == target.name) {
            steps.push(
                PipelineStep::new(&target.name, StepKind::Deploy)
                    .label(format!("Deploy {} to {}", target.branch, target.environment))
                    .needs(VERIFY)
                    .with_config("target", target.name.clone()),
            );
        } else {
            filtered.push(FilteredJob {
                id: target.name.clone(),
                reason: format!("runs on {}", target.branch),
            });
        }
    }

    (steps, filtered)
}

/// Flags steps whose configuration is incomplete.
pub struct WorkflowResolver {
    config: WorkflowConfig,
}

impl WorkflowResolver {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

impl PipelineCapabilityResolver for WorkflowResolver {
    fn missing(&self, step: &PipelineStep) -> Vec<String> {
        let mut missing = Vec::new();
        match step.kind {
            StepKind::Provision => {
                if blank(Some(&self.config.provision.sync)) {
                    missing.push("provision.sync".to_string());
                }
            }
            StepKind::Verify => {
                if self.config.verify.checks.is_empty() {
                    missing.push("verify.checks".to_string());
                }
            }
            StepKind::Package => {
                if blank(self.config.package.script.as_deref()) {
                    missing.push("package.script".to_string());
                }
                if let Some(upload) = &self.config.package.upload {
                    if blank(Some(&upload.host)) {
                        missing.push("package.upload.host".to_string());
                    }
                }
            }
            StepKind::MessagesPush => {
                if blank(self.config.messages.command.as_deref()) {
                    missing.push("messages.command".to_string());
                }
            }
            StepKind::Deploy => {
                let target = step
                    .config_str("target")
                    .and_then(|name| self.config.deploy.iter().find(|t| t.name == name));
                match target {
                    Some(t) if blank(Some(&t.command)) => {
                        missing.push(format!("deploy.{}.command", t.name))
                    }
                    Some(_) => {}
                    None => missing.push(format!("deploy.{}", step.id)),
                }
            }
        }
        missing
    }
}

/// Executes workflow steps against a workspace.
pub struct WorkflowExecutor {
    config: WorkflowConfig,
    root: PathBuf,
    git_ref: GitRef,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn CacheStore>,
}

impl WorkflowExecutor {
    pub fn new(
        config: WorkflowConfig,
        root: PathBuf,
        git_ref: GitRef,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            config,
            root,
            git_ref,
            runner,
            store,
        }
    }

    fn push_messages(&self) -> Result<StepOutput> {
        let command = self
            .config
            .messages
            .command
            .as_deref()
            .ok_or_else(|| Error::config_missing_key("messages.command", None))?;
        let spec = CommandSpec::shell(command).in_dir(&self.root);
        log_status!("messages", "$ {}", command);
        let out = self.runner.run(&spec);
        if !out.success {
            return Err(Error::messages_push_failed(out.failure_details(&spec)));
        }
        StepOutput::data(&serde_json::json!({ "command": command }))
    }
}

impl PipelineStepExecutor for WorkflowExecutor {
    fn execute_step(&self, step: &PipelineStep) -> Result<StepOutput> {
        let runner = self.runner.as_ref();
        match step.kind {
            StepKind::Provision => {
                let report = provision::run(&self.config, &self.root, self.store.as_ref(), runner)?;
                StepOutput::data(&report)
            }
            StepKind::Verify => {
                let report = verify::run(&self.config.verify, &self.root, runner)?;
                let warnings = report.warnings.clone();
                Ok(StepOutput::data(&report)?.with_warnings(warnings))
            }
            StepKind::Package => {
                let outcome = release::run(&self.config.package, &self.root, &self.git_ref, runner)?;
                StepOutput::data(&outcome)
            }
            StepKind::MessagesPush => self.push_messages(),
            StepKind::Deploy => {
                let name = step.config_str("target").unwrap_or(step.id.as_str());
                let target = deploy::find(&self.config.deploy, name)?;
                let report = deploy::run(target, &self.root, &self.git_ref, runner)?;
                StepOutput::data(&report)
            }
        }
    }
}

pub fn plan(config: &WorkflowConfig, git_ref: &GitRef) -> Result<WorkflowPlan> {
    let (steps, filtered) = build_steps(config, git_ref);
    let resolver = WorkflowResolver::new(config.clone());
    Ok(WorkflowPlan {
        git_ref: git_ref.clone(),
        plan: pipeline::plan(&steps, &resolver)?,
        filtered,
    })
}

pub fn run(
    config: &WorkflowConfig,
    root: PathBuf,
    git_ref: &GitRef,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn CacheStore>,
) -> Result<WorkflowRun> {
    let (steps, filtered) = build_steps(config, git_ref);
    let executor = Arc::new(WorkflowExecutor::new(
        config.clone(),
        root,
        git_ref.clone(),
        runner,
        store,
    ));
    let resolver = Arc::new(WorkflowResolver::new(config.clone()));

    let result = pipeline::run(&steps, executor, resolver)?;
    Ok(WorkflowRun {
        git_ref: git_ref.clone(),
        result,
        filtered,
    })
}

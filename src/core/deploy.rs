//! Branch-gated deployment triggers.

use std::path::Path;

use serde::Serialize;

use crate::config::DeployTarget;
use crate::error::{Error, Result};
use crate::git::GitRef;
use crate::runner::{CommandRunner, CommandSpec};
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};

pub const ENVIRONMENT_VAR: &str = "DEPLOY_ENVIRONMENT";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReport {
    pub target: String,
    pub environment: String,
    pub branch: String,
    pub command: String,
}

/// Targets whose branch is the ref's branch.
pub fn targets_for<'a>(targets: &'a [DeployTarget], git_ref: &GitRef) -> Vec<&'a DeployTarget> {
    targets
        .iter()
        .filter(|t| git_ref.is_branch(&t.branch))
        .collect()
}

pub fn find<'a>(targets: &'a [DeployTarget], name: &str) -> Result<&'a DeployTarget> {
    targets.iter().find(|t| t.name == name).ok_or_else(|| {
        Error::deploy_target_not_found(name, targets.iter().map(|t| t.name.clone()).collect())
    })
}

/// Render the deploy command; the environment goes last when the template
/// does not place it.
pub fn command_for(target: &DeployTarget, branch: &str) -> String {
    let env = shell::quote_arg(&target.environment);
    let rendered = template::render(
        &target.command,
        &[
            (TemplateVars::ENVIRONMENT, &env),
            (TemplateVars::BRANCH, &shell::quote_arg(branch)),
        ],
    );
    if template::is_present(&target.command, TemplateVars::ENVIRONMENT) {
        rendered
    } else {
        format!("{} {}", rendered, env)
    }
}

/// Run the target's deploy command. Refuses to run for any other branch.
pub fn run(
    target: &DeployTarget,
    root: &Path,
    git_ref: &GitRef,
    runner: &dyn CommandRunner,
) -> Result<DeployReport> {
    if !git_ref.is_branch(&target.branch) {
        return Err(Error::deploy_branch_not_allowed(
            &target.name,
            &target.branch,
            git_ref.branch.clone(),
        ));
    }

    let command = command_for(target, &target.branch);
    let spec = CommandSpec::shell(&command)
        .in_dir(root)
        .with_env(ENVIRONMENT_VAR, &target.environment);

    log_status!("deploy", "{} -> {}: $ {}", target.branch, target.environment, command);
    let out = runner.run(&spec);
    if !out.success {
        return Err(Error::deploy_failed(&target.name, out.failure_details(&spec)));
    }

    Ok(DeployReport {
        target: target.name.clone(),
        environment: target.environment.clone(),
        branch: target.branch.clone(),
        command,
    })
}

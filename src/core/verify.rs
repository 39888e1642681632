//! Verification gate: drift checks then the test suite, cheapest first.

use std::path::Path;

use serde::Serialize;

use crate::config::{CheckConfig, CheckKind, VerifyConfig};
use crate::error::{Error, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use crate::utils::template::{self, TemplateVars};

/// Catalog header rewritten on every extraction; not a content change.
const VOLATILE_CATALOG_HEADER: &str = "^\"POT-Creation-Date:";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub name: String,
    pub kind: CheckKind,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub checks: Vec<CheckReport>,
    pub published: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Checks in execution order. Sorting is stable so checks of equal kind
/// keep their configured order.
pub fn ordered_checks(config: &VerifyConfig) -> Vec<&CheckConfig> {
    let mut checks: Vec<&CheckConfig> = config.checks.iter().collect();
    checks.sort_by_key(|c| c.kind.cost_rank());
    checks
}

pub fn run(config: &VerifyConfig, root: &Path, runner: &dyn CommandRunner) -> Result<VerifyReport> {
    let workers = config.workers.to_string();
    let mut reports = Vec::new();

    for check in ordered_checks(config) {
        let command = template::render(&check.command, &[(TemplateVars::WORKERS, &workers)]);
        let spec = CommandSpec::shell(&command).in_dir(root);
        log_status!("verify", "[{}] $ {}", check.name, command);
        let out = runner.run(&spec);

        match check.kind {
            CheckKind::MigrationDrift => {
                if !out.success {
                    return Err(Error::verify_migration_drift(command, output_lines(&out)));
                }
            }
            CheckKind::MessageDrift => {
                if !out.success {
                    return Err(Error::verify_message_drift(command, output_lines(&out))
                        .with_hint("Message extraction itself failed; see details"));
                }
                let changes = catalog_changes(root, &check.paths, runner)?;
                if !changes.is_empty() {
                    return Err(Error::verify_message_drift(command, changes));
                }
            }
            CheckKind::Tests => {
                if !out.success {
                    return Err(Error::verify_tests_failed(out.failure_details(&spec)));
                }
            }
        }

        reports.push(CheckReport {
            name: check.name.clone(),
            kind: check.kind,
            command,
        });
    }

    let mut published = Vec::new();
    let mut warnings = Vec::new();
    for command in &config.publish {
        let spec = CommandSpec::shell(command).in_dir(root);
        log_status!("verify", "$ {}", command);
        let out = runner.run(&spec);
        if out.success {
            published.push(command.clone());
        } else {
            warnings.push(format!("Publishing '{}' failed: {}", command, out.error_text()));
        }
    }

    Ok(VerifyReport {
        checks: reports,
        published,
        warnings,
    })
}

/// Working-tree changes under the catalog paths, ignoring files whose only
/// difference is the regenerated creation-date header.
fn catalog_changes(root: &Path, paths: &[String], runner: &dyn CommandRunner) -> Result<Vec<String>> {
    let mut args = vec!["status".to_string(), "--porcelain".to_string(), "--".to_string()];
    args.extend(paths.iter().cloned());
    let spec = CommandSpec::new("git", args).in_dir(root);
    let out = runner.run(&spec);
    if !out.success {
        return Err(Error::git_command_failed(format!(
            "git status failed: {}",
            out.error_text()
        )));
    }

    let mut changes = Vec::new();
    for line in out.stdout.lines().filter(|l| !l.trim().is_empty()) {
        let (status, file) = line.split_at(line.len().min(3));
        if status.trim() == "M" && header_only_change(root, file.trim(), runner) {
            continue;
        }
        changes.push(line.to_string());
    }
    Ok(changes)
}

fn header_only_change(root: &Path, file: &str, runner: &dyn CommandRunner) -> bool {
    let spec = CommandSpec::new(
        "git",
        [
            "diff",
            "--quiet",
            "--ignore-matching-lines",
            VOLATILE_CATALOG_HEADER,
            "--",
            file,
        ],
    )
    .in_dir(root);
    runner.run(&spec).success
}

fn output_lines(out: &CommandOutput) -> Vec<String> {
    out.stdout
        .lines()
        .chain(out.stderr.lines())
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkflowConfig;
    use std::sync::Mutex;

    /// Replies by substring match; anything unmatched succeeds silently.
    #[derive(Default)]
    struct Scripted {
        replies: Vec<(&'static str, CommandOutput)>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn reply(mut self, needle: &'static str, success: bool, stdout: &str) -> Self {
            self.replies.push((
                needle,
                CommandOutput {
                    stdout: stdout.to_string(),
                    success,
                    exit_code: if success { 0 } else { 1 },
                    ..Default::default()
                },
            ));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for Scripted {
        fn run(&self, spec: &CommandSpec) -> CommandOutput {
            let line = spec.display();
            self.calls.lock().unwrap().push(line.clone());
            self.replies
                .iter()
                .find(|(needle, _)| line.contains(needle))
                .map(|(_, out)| out.clone())
                .unwrap_or(CommandOutput {
                    success: true,
                    ..Default::default()
                })
        }
    }

    fn config() -> VerifyConfig {
        WorkflowConfig::default().verify
    }

    #[test]
    fn checks_sorted_cheapest_first() {
        let mut cfg = config();
        cfg.checks.reverse();
        let names: Vec<&str> = ordered_checks(&cfg).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["migrations", "messages", "tests"]);
    }

    #[test]
    fn migration_drift_stops_before_tests() {
        let runner = Scripted::default().reply(
            "makemigrations",
            false,
            "Migrations for 'groups':\n  0042_group_theme.py\n",
        );

        let err = run(&config(), Path::new("."), &runner).unwrap_err();
        assert_eq!(err.code.as_str(), "verify.migration_drift");
        assert!(!runner.calls().iter().any(|c| c.contains("pytest")));
        assert!(!runner.calls().iter().any(|c| c.contains("makemessages")));
    }

    #[test]
    fn catalog_change_is_message_drift() {
        let runner = Scripted::default()
            .reply("status --porcelain", true, "?? karrot/locale/en/LC_MESSAGES/new.po\n");

        let err = run(&config(), Path::new("."), &runner).unwrap_err();
        assert_eq!(err.code.as_str(), "verify.message_drift");
        assert!(!runner.calls().iter().any(|c| c.contains("pytest")));
    }

    #[test]
    fn header_only_catalog_change_passes() {
        let runner = Scripted::default()
            .reply("status --porcelain", true, " M karrot/locale/en/LC_MESSAGES/django.po\n")
            .reply("diff --quiet", true, "");

        let report = run(&config(), Path::new("."), &runner).unwrap();
        assert_eq!(report.checks.len(), 3);
    }

    #[test]
    fn tests_receive_worker_count() {
        let mut cfg = config();
        cfg.workers = 8;
        let runner = Scripted::default();

        run(&cfg, Path::new("."), &runner).unwrap();
        assert!(runner.calls().iter().any(|c| c.contains("pytest -n 8")));
    }

    #[test]
    fn failing_tests_have_distinct_code() {
        let runner = Scripted::default().reply("pytest", false, "2 failed, 310 passed");
        let err = run(&config(), Path::new("."), &runner).unwrap_err();
        assert_eq!(err.code.as_str(), "verify.tests_failed");
    }

    #[test]
    fn publish_failure_is_only_a_warning() {
        let runner = Scripted::default().reply("codecov", false, "");
        let report = run(&config(), Path::new("."), &runner).unwrap();
        assert!(report.published.is_empty());
        assert_eq!(report.warnings.len(), 1);
    }
}

//! Process execution seam.
//!
//! Every external tool foreman drives (package manager, test runner, git,
//! scp, deploy scripts) goes through [`CommandRunner`], so pipeline logic can
//! be exercised with a scripted runner in tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::CommandFailedDetails;
use crate::utils::shell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    /// A command line interpreted by `sh -c`.
    pub fn shell(command: &str) -> Self {
        Self::new("sh", ["-c", command])
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Human-readable form used in logs and error details.
    pub fn display(&self) -> String {
        if self.program == "sh" && self.args.len() == 2 && self.args[0] == "-c" {
            return self.args[1].clone();
        }
        let mut parts = vec![shell::quote_arg(&self.program)];
        parts.extend(self.args.iter().map(|a| shell::quote_arg(a)));
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn failure_details(&self, spec: &CommandSpec) -> CommandFailedDetails {
        CommandFailedDetails {
            command: spec.display(),
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> String {
        if !self.stderr.trim().is_empty() {
            self.stderr.trim().to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> CommandOutput;
}

/// Runs commands as local child processes with a fixed base environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    base_env: BTreeMap<String, String>,
}

impl ProcessRunner {
    pub fn new(base_env: BTreeMap<String, String>) -> Self {
        Self { base_env }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutput {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);

        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        cmd.envs(self.base_env.iter());
        cmd.envs(spec.env.iter().map(|(k, v)| (k, v)));

        match cmd.output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput {
                stdout: String::new(),
                stderr: format!("Command error: {}", e),
                success: false,
                exit_code: -1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_spec_displays_raw_command() {
        let spec = CommandSpec::shell("pytest -n 4 && echo done");
        assert_eq!(spec.display(), "pytest -n 4 && echo done");
    }

    #[test]
    fn program_spec_quotes_arguments() {
        let spec = CommandSpec::new("git", ["commit", "-m", "Update dependencies"]);
        assert_eq!(spec.display(), "git commit -m 'Update dependencies'");
    }

    #[test]
    fn process_runner_applies_base_env() {
        let mut env = BTreeMap::new();
        env.insert("LC_ALL".to_string(), "C.UTF-8".to_string());
        let runner = ProcessRunner::new(env);

        let out = runner.run(&CommandSpec::shell("printf %s \"$LC_ALL\""));
        assert!(out.success);
        assert_eq!(out.stdout, "C.UTF-8");
    }

    #[test]
    fn process_runner_reports_spawn_failure() {
        let runner = ProcessRunner::default();
        let out = runner.run(&CommandSpec::new("nonexistent_command_xyz", Vec::<String>::new()));
        assert!(!out.success);
        assert_eq!(out.exit_code, -1);
        assert!(out.error_text().contains("Command error"));
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let out = CommandOutput {
            stdout: "stdout content".to_string(),
            stderr: "  ".to_string(),
            success: false,
            exit_code: 1,
        };
        assert_eq!(out.error_text(), "stdout content");
    }
}

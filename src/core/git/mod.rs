//! Git plumbing used by the pipeline and the maintenance jobs.

mod refs;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

pub use refs::GitRef;

/// A working tree driven through a [`CommandRunner`].
pub struct Git<'a> {
    runner: &'a dyn CommandRunner,
    dir: PathBuf,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dir: &Path) -> Self {
        Self {
            runner,
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn spec(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("git", args.iter().copied()).in_dir(&self.dir)
    }

    /// Run without interpreting the exit status.
    pub fn output(&self, args: &[&str]) -> CommandOutput {
        self.runner.run(&self.spec(args))
    }

    /// Run and return trimmed stdout; a non-zero exit is an error.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let out = self.output(args);
        if !out.success {
            return Err(Error::git_command_failed(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                out.error_text()
            )));
        }
        Ok(out.stdout.trim().to_string())
    }

    fn optional(&self, args: &[&str]) -> Option<String> {
        let out = self.output(args);
        let value = out.stdout.trim();
        (out.success && !value.is_empty()).then(|| value.to_string())
    }

    /// Branch checked out in the working tree; `None` when detached.
    pub fn current_branch(&self) -> Option<String> {
        self.optional(&["rev-parse", "--abbrev-ref", "HEAD"])
            .filter(|b| b != "HEAD")
    }

    /// Tag pointing exactly at HEAD, if any.
    pub fn exact_tag(&self) -> Option<String> {
        self.optional(&["describe", "--tags", "--exact-match", "HEAD"])
    }

    /// Commit the remote branch points at, `None` when it does not exist.
    pub fn remote_tip(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        let refname = format!("refs/heads/{}", branch);
        let stdout = self.run(&["ls-remote", "--heads", remote, &refname])?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .next()
            .map(String::from))
    }

    pub fn tree_of(&self, rev: &str) -> Option<String> {
        self.optional(&["rev-parse", "--verify", "--quiet", &format!("{}^{{tree}}", rev)])
    }

    pub fn head(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    /// Whether the index differs from HEAD.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.output(&["diff", "--cached", "--quiet"]);
        match out.exit_code {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::git_command_failed(format!(
                "git diff --cached failed: {}",
                out.error_text()
            ))),
        }
    }
}

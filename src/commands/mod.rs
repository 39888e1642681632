use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;

use foreman::cache::FsCacheStore;
use foreman::config::WorkflowConfig;
use foreman::git::{Git, GitRef};
use foreman::paths;
use foreman::runner::ProcessRunner;

pub type CmdResult<T> = foreman::Result<(T, i32)>;

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Workflow file (defaults to <workdir>/foreman.yml, then built-ins)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Branch being built (overrides CIRCLE_BRANCH and git)
    #[arg(long, global = true)]
    pub branch: Option<String>,

    /// Tag being built (overrides CIRCLE_TAG and git)
    #[arg(long, global = true)]
    pub tag: Option<String>,
}

/// Loaded workflow plus the collaborators commands hand to the core.
pub(crate) struct Workspace {
    pub root: PathBuf,
    pub config: WorkflowConfig,
    pub source: Option<PathBuf>,
    pub runner: Arc<ProcessRunner>,
}

impl Workspace {
    pub fn load(global: &GlobalArgs) -> foreman::Result<Self> {
        let root = match &global.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|e| {
                foreman::Error::internal_io(e.to_string(), Some("resolve working directory".to_string()))
            })?,
        };
        let loaded = foreman::config::load(&root, global.config.as_deref())?;
        let runner = Arc::new(ProcessRunner::new(loaded.config.environment.clone()));
        Ok(Self {
            root,
            config: loaded.config,
            source: loaded.source,
            runner,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git(&self) -> Git<'_> {
        Git::new(self.runner.as_ref(), &self.root)
    }

    pub fn git_ref(&self, global: &GlobalArgs) -> GitRef {
        GitRef::resolve(global.branch.clone(), global.tag.clone(), &self.git())
    }

    pub fn cache_store(&self) -> foreman::Result<FsCacheStore> {
        let dir = match &self.config.cache.dir {
            Some(dir) => paths::resolve_in(&self.root, dir),
            None => paths::cache()?,
        };
        Ok(FsCacheStore::new(dir))
    }
}

/// Exit code for a report carrying a failed step's error code.
pub(crate) fn exit_code_for_step_code(code: &str) -> i32 {
    foreman::error::codes::parse_code(code)
        .map(crate::output::exit_code_for_error)
        .unwrap_or(1)
}

pub mod cache;
pub mod config;
pub mod deploy;
pub mod maintain;
pub mod package;
pub mod plan;
pub mod provision;
pub mod run;
pub mod schedule;
pub mod verify;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (foreman::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Provision(args) => dispatch!(args, global, provision),
        crate::Commands::Verify(args) => dispatch!(args, global, verify),
        crate::Commands::Package(args) => dispatch!(args, global, package),
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Cache(args) => dispatch!(args, global, cache),
        crate::Commands::Maintain(args) => dispatch!(args, global, maintain),
        crate::Commands::Schedule(args) => dispatch!(args, global, schedule),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_codes_map_through_error_codes() {
        assert_eq!(exit_code_for_step_code("release.upload_failed"), 20);
        assert_eq!(exit_code_for_step_code("verify.tests_failed"), 30);
        assert_eq!(exit_code_for_step_code("no.such_code"), 1);
    }
}

//! Workflow configuration (`foreman.yml`).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults::*;
use crate::error::{Error, Result};
use crate::paths;
use crate::schedule;
use crate::utils::io;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_project")]
    pub project: String,

    /// Variables exported to every spawned command.
    #[serde(default = "default_environment")]
    pub environment: BTreeMap<String, String>,

    #[serde(default = "default_cache")]
    pub cache: CacheConfig,

    #[serde(default = "default_provision")]
    pub provision: ProvisionConfig,

    #[serde(default = "default_verify")]
    pub verify: VerifyConfig,

    #[serde(default = "default_package")]
    pub package: PackageConfig,

    #[serde(default = "default_messages")]
    pub messages: MessagesConfig,

    #[serde(default = "default_deploy_targets")]
    pub deploy: Vec<DeployTarget>,

    #[serde(default = "default_maintenance")]
    pub maintenance: MaintenanceConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            environment: default_environment(),
            cache: default_cache(),
            provision: default_provision(),
            verify: default_verify(),
            package: default_package(),
            messages: default_messages(),
            deploy: default_deploy_targets(),
            maintenance: default_maintenance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root; defaults to `$FOREMAN_HOME/cache`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_cache_paths")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default = "default_install_commands")]
    pub install: Vec<String>,
    #[serde(default = "default_sync_command")]
    pub sync: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    MigrationDrift,
    MessageDrift,
    Tests,
}

impl CheckKind {
    /// Relative cost; cheaper checks run first.
    pub fn cost_rank(&self) -> u8 {
        match self {
            CheckKind::MigrationDrift => 0,
            CheckKind::MessageDrift => 1,
            CheckKind::Tests => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::MigrationDrift => "migration_drift",
            CheckKind::MessageDrift => "message_drift",
            CheckKind::Tests => "tests",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    pub kind: CheckKind,
    pub command: String,
    /// Catalog paths compared after a message re-extraction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default = "default_checks")]
    pub checks: Vec<CheckConfig>,
    #[serde(default = "default_test_workers")]
    pub workers: u32,
    /// Result and coverage uploads run after every check passed.
    #[serde(default = "default_publish_commands")]
    pub publish: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Branch or tag patterns allowed to produce a release.
    #[serde(default = "default_release_branches")]
    pub branches: Vec<String>,
    #[serde(default = "default_project")]
    pub name: String,
    #[serde(default = "default_package_script_opt")]
    pub script: Option<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_true")]
    pub verify_archive: bool,
    #[serde(default = "default_upload_opt")]
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployTarget {
    pub name: String,
    pub branch: String,
    pub environment: String,
    #[serde(default = "default_deploy_command")]
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_base_branch")]
    pub base: String,
    /// `owner/name` of the repository pull requests are opened against.
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_author")]
    pub author: AuthorConfig,
    #[serde(default = "default_lock_ttl_minutes")]
    pub lock_ttl_minutes: u64,
    #[serde(default = "default_dependency_job")]
    pub dependencies: DependencyJobConfig,
    #[serde(default = "default_locale_job")]
    pub locales: LocaleJobConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestTemplate {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkerPatch {
    pub package: String,
    pub marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyJobConfig {
    pub schedule: String,
    pub branch: String,
    pub compile: String,
    pub lock_file: String,
    #[serde(default)]
    pub marker_patch: Option<MarkerPatch>,
    /// Commands run after the compile step, e.g. front-end lock refresh.
    #[serde(default)]
    pub extra_commands: Vec<String>,
    #[serde(default)]
    pub extra_paths: Vec<String>,
    pub commit_message: String,
    pub pull_request: PullRequestTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleJobConfig {
    pub schedule: String,
    pub branch: String,
    pub command: String,
    pub workers: u32,
    pub locale_dir: String,
    pub commit_message: String,
    pub pull_request: PullRequestTemplate,
}

impl LocaleJobConfig {
    /// Worker count passed to the translation client, capped at
    /// [`MAX_LOCALE_WORKERS`].
    pub fn effective_workers(&self) -> u32 {
        self.workers.clamp(1, MAX_LOCALE_WORKERS)
    }
}

fn default_true() -> bool {
    true
}

fn default_package_script_opt() -> Option<String> {
    Some(default_package_script())
}

fn default_upload_opt() -> Option<UploadConfig> {
    Some(default_upload())
}

/// A loaded workflow together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WorkflowConfig,
    pub source: Option<PathBuf>,
}

/// Load the workflow for a workspace.
///
/// An explicit path must exist. Without one, `<root>/foreman.yml` is used
/// when present, otherwise the built-in defaults.
pub fn load(root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(p) => {
            let resolved = paths::resolve_in(root, &p.to_string_lossy());
            if !resolved.exists() {
                return Err(Error::config_missing_key(
                    "config",
                    Some(resolved.to_string_lossy().to_string()),
                )
                .with_hint("Pass an existing workflow file to --config"));
            }
            Some(resolved)
        }
        None => {
            let candidate = paths::workflow_file(root);
            candidate.exists().then_some(candidate)
        }
    };

    let config = match &path {
        Some(p) => {
            let raw = io::read_file(p, "read workflow file")?;
            parse(&raw, &p.to_string_lossy())?
        }
        None => WorkflowConfig::default(),
    };

    validate(&config)?;

    Ok(LoadedConfig {
        config,
        source: path,
    })
}

pub fn parse(raw: &str, origin: &str) -> Result<WorkflowConfig> {
    if raw.trim().is_empty() {
        return Ok(WorkflowConfig::default());
    }
    serde_yml::from_str(raw).map_err(|e| Error::config_invalid_yaml(origin, e))
}

pub fn validate(config: &WorkflowConfig) -> Result<()> {
    if config.verify.workers == 0 {
        return Err(Error::config_invalid_value(
            "verify.workers",
            Some("0".to_string()),
            "Worker count must be at least 1",
        ));
    }

    if config.maintenance.locales.workers == 0 {
        return Err(Error::config_invalid_value(
            "maintenance.locales.workers",
            Some("0".to_string()),
            "Worker count must be at least 1",
        ));
    }

    let mut names = HashSet::new();
    for check in &config.verify.checks {
        if !names.insert(check.name.as_str()) {
            return Err(Error::config_invalid_value(
                "verify.checks",
                Some(check.name.clone()),
                "Duplicate check name",
            ));
        }
        if check.kind == CheckKind::MessageDrift && check.paths.is_empty() {
            return Err(Error::config_invalid_value(
                format!("verify.checks.{}.paths", check.name),
                None,
                "Message drift checks need at least one catalog path",
            ));
        }
    }

    let mut targets = HashSet::new();
    for target in &config.deploy {
        if !targets.insert(target.name.as_str()) {
            return Err(Error::config_invalid_value(
                "deploy",
                Some(target.name.clone()),
                "Duplicate deploy target name",
            ));
        }
        if target.branch.trim().is_empty() || target.environment.trim().is_empty() {
            return Err(Error::config_invalid_value(
                format!("deploy.{}", target.name),
                None,
                "Deploy targets need a branch and an environment",
            ));
        }
    }

    if !config.maintenance.repository.contains('/') {
        return Err(Error::config_invalid_value(
            "maintenance.repository",
            Some(config.maintenance.repository.clone()),
            "Expected owner/name",
        ));
    }

    schedule::parse(&config.maintenance.dependencies.schedule).map_err(|e| {
        Error::config_invalid_value(
            "maintenance.dependencies.schedule",
            Some(config.maintenance.dependencies.schedule.clone()),
            e.message,
        )
    })?;
    schedule::parse(&config.maintenance.locales.schedule).map_err(|e| {
        Error::config_invalid_value(
            "maintenance.locales.schedule",
            Some(config.maintenance.locales.schedule.clone()),
            e.message,
        )
    })?;

    Ok(())
}

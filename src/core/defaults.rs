//! Built-in workflow values.
//!
//! An absent `foreman.yml` yields the karrot-backend pipeline described by
//! these functions; every field in the workflow file falls back to them.

use std::collections::BTreeMap;

use crate::config::{
    AuthorConfig, CacheConfig, CheckConfig, CheckKind, DependencyJobConfig, DeployTarget,
    LocaleJobConfig, MaintenanceConfig, MarkerPatch, MessagesConfig, PackageConfig,
    ProvisionConfig, PullRequestTemplate, UploadConfig, VerifyConfig,
};

/// Upper bound for the translation client's parallel downloads.
pub const MAX_LOCALE_WORKERS: u32 = 16;

pub(crate) fn default_project() -> String {
    "karrot-backend".to_string()
}

pub(crate) fn default_environment() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("LC_ALL".to_string(), "C.UTF-8".to_string());
    env.insert("LANG".to_string(), "C.UTF-8".to_string());
    env
}

// =============================================================================
// Cache + provisioning
// =============================================================================

pub(crate) fn default_cache() -> CacheConfig {
    CacheConfig {
        dir: None,
        prefix: default_cache_prefix(),
        manifest: default_manifest(),
        paths: default_cache_paths(),
    }
}

pub(crate) fn default_cache_prefix() -> String {
    "v1-dependencies-".to_string()
}

pub(crate) fn default_manifest() -> String {
    "requirements.txt".to_string()
}

pub(crate) fn default_cache_paths() -> Vec<String> {
    vec!["env".to_string()]
}

pub(crate) fn default_provision() -> ProvisionConfig {
    ProvisionConfig {
        install: default_install_commands(),
        sync: default_sync_command(),
    }
}

pub(crate) fn default_install_commands() -> Vec<String> {
    vec![
        "test -d env || python3 -m venv env".to_string(),
        "env/bin/pip install --upgrade pip pip-tools".to_string(),
    ]
}

pub(crate) fn default_sync_command() -> String {
    "env/bin/pip-sync requirements.txt".to_string()
}

// =============================================================================
// Verification
// =============================================================================

pub(crate) fn default_verify() -> VerifyConfig {
    VerifyConfig {
        checks: default_checks(),
        workers: default_test_workers(),
        publish: default_publish_commands(),
    }
}

pub(crate) fn default_checks() -> Vec<CheckConfig> {
    vec![
        CheckConfig {
            name: "migrations".to_string(),
            kind: CheckKind::MigrationDrift,
            command: "env/bin/python manage.py makemigrations --check --dry-run".to_string(),
            paths: Vec::new(),
        },
        CheckConfig {
            name: "messages".to_string(),
            kind: CheckKind::MessageDrift,
            command: "env/bin/python manage.py makemessages -l en".to_string(),
            paths: vec!["karrot/locale/en".to_string()],
        },
        CheckConfig {
            name: "tests".to_string(),
            kind: CheckKind::Tests,
            command: "env/bin/pytest -n {{workers}} --cov=karrot --cov-report=xml --junitxml=test-reports/junit.xml"
                .to_string(),
            paths: Vec::new(),
        },
    ]
}

pub(crate) fn default_test_workers() -> u32 {
    4
}

pub(crate) fn default_publish_commands() -> Vec<String> {
    vec!["env/bin/codecov --file coverage.xml".to_string()]
}

// =============================================================================
// Packaging, messages, deploy
// =============================================================================

pub(crate) fn default_package() -> PackageConfig {
    PackageConfig {
        branches: default_release_branches(),
        name: default_project(),
        script: Some(default_package_script()),
        output_dir: default_output_dir(),
        verify_archive: true,
        upload: Some(default_upload()),
    }
}

pub(crate) fn default_release_branches() -> Vec<String> {
    vec!["master".to_string(), "production".to_string()]
}

pub(crate) fn default_package_script() -> String {
    "./mkpyz {{output}}".to_string()
}

pub(crate) fn default_output_dir() -> String {
    "dist".to_string()
}

pub(crate) fn default_upload() -> UploadConfig {
    UploadConfig {
        host: "karrot.world".to_string(),
        user: "releases".to_string(),
        port: default_ssh_port(),
        path: "/var/www/releases/karrot-backend/".to_string(),
        identity_file: None,
    }
}

pub(crate) fn default_ssh_port() -> u16 {
    22
}

pub(crate) fn default_messages() -> MessagesConfig {
    MessagesConfig {
        branches: vec!["master".to_string()],
        command: Some("tx push --source".to_string()),
    }
}

pub(crate) fn default_deploy_targets() -> Vec<DeployTarget> {
    vec![
        DeployTarget {
            name: "deploy-dev".to_string(),
            branch: "master".to_string(),
            environment: "dev".to_string(),
            command: default_deploy_command(),
        },
        DeployTarget {
            name: "deploy-world".to_string(),
            branch: "production".to_string(),
            environment: "world".to_string(),
            command: default_deploy_command(),
        },
    ]
}

pub(crate) fn default_deploy_command() -> String {
    "./deploy.sh {{environment}}".to_string()
}

// =============================================================================
// Scheduled maintenance
// =============================================================================

pub(crate) fn default_maintenance() -> MaintenanceConfig {
    MaintenanceConfig {
        remote: default_remote(),
        base: default_base_branch(),
        repository: default_repository(),
        api_url: default_api_url(),
        token_env: default_token_env(),
        author: default_author(),
        lock_ttl_minutes: default_lock_ttl_minutes(),
        dependencies: default_dependency_job(),
        locales: default_locale_job(),
    }
}

pub(crate) fn default_remote() -> String {
    "origin".to_string()
}

pub(crate) fn default_base_branch() -> String {
    "master".to_string()
}

pub(crate) fn default_repository() -> String {
    "karrot-dev/karrot-backend".to_string()
}

pub(crate) fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

pub(crate) fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

pub(crate) fn default_author() -> AuthorConfig {
    AuthorConfig {
        name: "karrot-bot".to_string(),
        email: "bot@karrot.world".to_string(),
    }
}

pub(crate) fn default_lock_ttl_minutes() -> u64 {
    120
}

pub(crate) fn default_dependency_job() -> DependencyJobConfig {
    DependencyJobConfig {
        schedule: "0 2 * * 0".to_string(),
        branch: "update-dependencies".to_string(),
        compile: "env/bin/pip-compile --upgrade --no-annotate --output-file requirements.txt requirements.in"
            .to_string(),
        lock_file: default_manifest(),
        marker_patch: Some(MarkerPatch {
            package: "backports.zoneinfo".to_string(),
            marker: "python_version < \"3.9\"".to_string(),
        }),
        extra_commands: Vec::new(),
        extra_paths: vec!["mjml/yarn.lock".to_string()],
        commit_message: "Update dependencies".to_string(),
        pull_request: PullRequestTemplate {
            title: "Update dependencies".to_string(),
            body: "Automated weekly dependency upgrade.\n\n\
                   `requirements.txt` was regenerated with every pin raised to its latest \
                   allowed version. Please check the changelogs of major upgrades before merging."
                .to_string(),
        },
    }
}

pub(crate) fn default_locale_job() -> LocaleJobConfig {
    LocaleJobConfig {
        schedule: "0 4 * * *".to_string(),
        branch: "update-locales".to_string(),
        command: "tx pull --all --force --workers {{workers}}".to_string(),
        workers: 4,
        locale_dir: "karrot/locale".to_string(),
        commit_message: "Update locales".to_string(),
        pull_request: PullRequestTemplate {
            title: "Update locales".to_string(),
            body: "Automated nightly sync of translations from the translation service.".to_string(),
        },
    }
}

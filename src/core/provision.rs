//! Environment provisioning with cache restore/save.

use std::path::Path;

use serde::Serialize;

use crate::cache::{CacheKey, CacheStore, RestoreOutcome, SaveOutcome};
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::paths;
use crate::runner::{CommandRunner, CommandSpec};
use crate::utils::io;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub key: CacheKey,
    pub restore: RestoreOutcome,
    pub commands: Vec<String>,
    /// Absent when the exact entry was restored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save: Option<SaveOutcome>,
}

/// Compute the cache key for the workspace manifest.
pub fn cache_key(config: &WorkflowConfig, root: &Path) -> Result<CacheKey> {
    let manifest = paths::resolve_in(root, &config.cache.manifest);
    let bytes = std::fs::read(&manifest).map_err(|e| {
        Error::internal_io(
            format!("{}: {}", manifest.display(), e),
            Some("read dependency manifest".to_string()),
        )
        .with_hint("Set cache.manifest in foreman.yml to the pinned requirements file")
    })?;
    CacheKey::for_manifest(&config.cache.prefix, &bytes)
}

/// Restore, install, always re-sync, then save unless the restore was exact.
///
/// A failing command aborts before anything is written to the cache.
pub fn run(
    config: &WorkflowConfig,
    root: &Path,
    store: &dyn CacheStore,
    runner: &dyn CommandRunner,
) -> Result<ProvisionReport> {
    let key = cache_key(config, root)?;
    log_status!("provision", "Cache key {}", key.exact);

    let restore = store.restore(&key, root)?;

    let mut commands = Vec::new();
    let steps = config
        .provision
        .install
        .iter()
        .chain(std::iter::once(&config.provision.sync));

    for command in steps {
        if command.trim().is_empty() {
            continue;
        }
        let spec = CommandSpec::shell(command).in_dir(root);
        log_status!("provision", "$ {}", spec.display());
        let out = runner.run(&spec);
        if !out.success {
            return Err(Error::provision_failed(out.failure_details(&spec)));
        }
        commands.push(spec.display());
    }

    let save = if restore.is_exact() {
        None
    } else {
        Some(store.save(&key, &config.cache.paths, root)?)
    };

    Ok(ProvisionReport {
        key,
        restore,
        commands,
        save,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsCacheStore;
    use crate::runner::CommandOutput;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRunner {
        fail_on: Option<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, spec: &CommandSpec) -> CommandOutput {
            let line = spec.display();
            self.calls.lock().unwrap().push(line.clone());
            let failed = self.fail_on.map(|f| line.contains(f)).unwrap_or(false);
            CommandOutput {
                success: !failed,
                exit_code: if failed { 1 } else { 0 },
                stderr: if failed { "No matching distribution".to_string() } else { String::new() },
                ..Default::default()
            }
        }
    }

    fn workspace(manifest: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), manifest).unwrap();
        fs::create_dir_all(dir.path().join("env")).unwrap();
        fs::write(dir.path().join("env").join("pyvenv.cfg"), "home = /usr").unwrap();
        dir
    }

    #[test]
    fn miss_installs_syncs_and_saves() {
        let work = workspace("Django==4.2\n");
        let cache = TempDir::new().unwrap();
        let store = FsCacheStore::new(cache.path());
        let runner = FakeRunner::default();

        let report = run(&WorkflowConfig::default(), work.path(), &store, &runner).unwrap();

        assert_eq!(report.restore, RestoreOutcome::Miss);
        assert!(matches!(report.save, Some(SaveOutcome::Saved { .. })));
        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.last().unwrap(), "env/bin/pip-sync requirements.txt");
    }

    #[test]
    fn exact_hit_still_syncs_but_does_not_save() {
        let work = workspace("Django==4.2\n");
        let cache = TempDir::new().unwrap();
        let store = FsCacheStore::new(cache.path());
        let config = WorkflowConfig::default();

        run(&config, work.path(), &store, &FakeRunner::default()).unwrap();

        let runner = FakeRunner::default();
        let report = run(&config, work.path(), &store, &runner).unwrap();
        assert!(report.restore.is_exact());
        assert!(report.save.is_none());
        assert!(runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.contains("pip-sync")));
    }

    #[test]
    fn failed_sync_saves_nothing() {
        let work = workspace("Django==4.2\n");
        let cache = TempDir::new().unwrap();
        let store = FsCacheStore::new(cache.path());
        let runner = FakeRunner {
            fail_on: Some("pip-sync"),
            ..Default::default()
        };

        let err = run(&WorkflowConfig::default(), work.path(), &store, &runner).unwrap_err();
        assert_eq!(err.code.as_str(), "provision.failed");
        assert!(store.list("v1-dependencies-").unwrap().is_empty());
    }

    #[test]
    fn missing_manifest_is_reported() {
        let work = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let store = FsCacheStore::new(cache.path());

        let err = run(
            &WorkflowConfig::default(),
            work.path(),
            &store,
            &FakeRunner::default(),
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::{CacheEntry, CacheKey, CacheStore, RestoreOutcome, SaveOutcome};
use crate::error::{Error, Result};
use crate::utils::io;

const ENTRY_FILE: &str = "entry.json";
const DATA_DIR: &str = "data";
const TEMP_PREFIX: &str = ".tmp-";

/// Cache entries stored as directories under a local root.
///
/// Layout: `<root>/<key>/entry.json` and `<root>/<key>/data/<path>`.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn read_entry(&self, key: &str) -> Result<CacheEntry> {
        let path = self.entry_dir(key).join(ENTRY_FILE);
        let raw = io::read_file(&path, "read cache entry")?;
        let entry: CacheEntry = serde_json::from_str(&raw)
            .map_err(|e| Error::cache_entry_invalid(key, e.to_string()))?;
        if entry.key != key {
            return Err(Error::cache_entry_invalid(
                key,
                format!("entry.json names key '{}'", entry.key),
            ));
        }
        Ok(entry)
    }

    fn copy_out(&self, entry: &CacheEntry, dest: &Path) -> Result<()> {
        let data = self.entry_dir(&entry.key).join(DATA_DIR);
        for rel in &entry.paths {
            let src = data.join(rel);
            if src.exists() {
                io::copy_recursive(&src, &dest.join(rel), "restore cache entry")?;
            }
        }
        Ok(())
    }
}

impl CacheStore for FsCacheStore {
    fn restore(&self, key: &CacheKey, dest: &Path) -> Result<RestoreOutcome> {
        if self.entry_dir(&key.exact).join(ENTRY_FILE).is_file() {
            let entry = self.read_entry(&key.exact)?;
            self.copy_out(&entry, dest)?;
            log_status!("cache", "Restored exact entry {}", entry.key);
            return Ok(RestoreOutcome::Exact { key: entry.key });
        }

        if let Some(entry) = self.list(&key.prefix)?.into_iter().next() {
            self.copy_out(&entry, dest)?;
            log_status!("cache", "Restored fallback entry {}", entry.key);
            return Ok(RestoreOutcome::Prefix { key: entry.key });
        }

        log_status!("cache", "No entry for {}", key.exact);
        Ok(RestoreOutcome::Miss)
    }

    fn save(&self, key: &CacheKey, paths: &[String], src: &Path) -> Result<SaveOutcome> {
        let target = self.entry_dir(&key.exact);
        if target.exists() {
            return Ok(SaveOutcome::AlreadyExists {
                key: key.exact.clone(),
            });
        }

        io::ensure_dir(&self.root, "create cache root")?;
        let staging = self
            .root
            .join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let data = staging.join(DATA_DIR);
        io::ensure_dir(&data, "create cache staging directory")?;

        let result = (|| -> Result<CacheEntry> {
            let mut stored = Vec::new();
            for rel in paths {
                let from = src.join(rel);
                if !from.exists() {
                    log_status!("cache", "Skipping absent path {}", rel);
                    continue;
                }
                io::copy_recursive(&from, &data.join(rel), "save cache entry")?;
                stored.push(rel.clone());
            }

            let entry = CacheEntry {
                key: key.exact.clone(),
                created_at: Utc::now(),
                paths: stored,
                manifest_hash: key.manifest_hash.clone(),
            };
            let raw = serde_json::to_string_pretty(&entry).map_err(|e| {
                Error::internal_json(e.to_string(), Some("serialize cache entry".to_string()))
            })?;
            io::write_file(&staging.join(ENTRY_FILE), &raw, "write cache entry")?;
            Ok(entry)
        })();

        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(err);
            }
        };

        match fs::rename(&staging, &target) {
            Ok(()) => {
                log_status!("cache", "Saved {} ({} paths)", entry.key, entry.paths.len());
                Ok(SaveOutcome::Saved { entry })
            }
            Err(_) if target.exists() => {
                let _ = fs::remove_dir_all(&staging);
                Ok(SaveOutcome::AlreadyExists {
                    key: key.exact.clone(),
                })
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                Err(Error::internal_io(
                    e.to_string(),
                    Some("publish cache entry".to_string()),
                ))
            }
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<CacheEntry>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let read = fs::read_dir(&self.root)
            .map_err(|e| Error::internal_io(e.to_string(), Some("list cache".to_string())))?;

        let mut entries = Vec::new();
        for dirent in read.flatten() {
            let name = dirent.file_name().to_string_lossy().to_string();
            if name.starts_with(TEMP_PREFIX) || !name.starts_with(prefix) {
                continue;
            }
            match self.read_entry(&name) {
                Ok(entry) => entries.push(entry),
                Err(err) => log_status!("cache", "Ignoring {}: {}", name, err.message),
            }
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.key.cmp(&a.key)));
        Ok(entries)
    }
}

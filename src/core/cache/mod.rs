//! Content-keyed environment cache.
//!
//! Entries are keyed by a hash of the dependency manifest and never change
//! once published. A restore prefers the exact key and otherwise falls back
//! to the newest entry sharing the key prefix.

mod key;
mod store;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub(crate) use key::sha256_hex;
pub use key::{manifest_hash, CacheKey};
pub use store::FsCacheStore;

/// Metadata stored beside the cached data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub paths: Vec<String>,
    pub manifest_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RestoreOutcome {
    Exact { key: String },
    Prefix { key: String },
    Miss,
}

impl RestoreOutcome {
    pub fn is_exact(&self) -> bool {
        matches!(self, RestoreOutcome::Exact { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved { entry: CacheEntry },
    AlreadyExists { key: String },
}

pub trait CacheStore: Send + Sync {
    /// Copy the best matching entry over `dest`.
    fn restore(&self, key: &CacheKey, dest: &Path) -> Result<RestoreOutcome>;

    /// Publish `paths` (relative to `src`) under the exact key.
    fn save(&self, key: &CacheKey, paths: &[String], src: &Path) -> Result<SaveOutcome>;

    /// Entries whose key starts with `prefix`, newest first.
    fn list(&self, prefix: &str) -> Result<Vec<CacheEntry>>;
}

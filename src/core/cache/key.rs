use std::fmt::Write as _;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Lowercase SHA-256 hex digest of the manifest bytes.
pub fn manifest_hash(bytes: &[u8]) -> String {
    sha256_hex(bytes)
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Exact cache key plus the prefix used for fallback lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub exact: String,
    pub prefix: String,
    pub manifest_hash: String,
}

impl CacheKey {
    pub fn for_manifest(prefix: &str, manifest: &[u8]) -> Result<Self> {
        validate_prefix(prefix)?;
        let hash = manifest_hash(manifest);
        Ok(Self {
            exact: format!("{}{}", prefix, hash),
            prefix: prefix.to_string(),
            manifest_hash: hash,
        })
    }
}

/// Keys name directories in the cache root.
fn validate_prefix(prefix: &str) -> Result<()> {
    let valid = !prefix.is_empty()
        && !prefix.starts_with('.')
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::config_invalid_value(
            "cache.prefix",
            Some(prefix.to_string()),
            "Use letters, digits, '-', '_' or '.' and do not start with '.'",
        ))
    }
}

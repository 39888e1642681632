//! Build output resolution by filename prefix.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// List regular files in `dir` whose name starts with `prefix`.
///
/// The prefix is escaped before globbing, so branch-derived names containing
/// glob metacharacters match literally.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let pattern = dir
        .join(format!("{}*", glob::Pattern::escape(prefix)))
        .to_string_lossy()
        .to_string();

    let mut entries: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| {
            Error::validation_invalid_argument(
                "artifact",
                format!("Invalid glob pattern '{}': {}", pattern, e),
                Some(pattern.clone()),
                None,
            )
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();

    entries.sort();
    Ok(entries)
}

/// Resolve the single file produced for `prefix`.
pub fn resolve_single(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let mut matches = files_with_prefix(dir, prefix)?;

    match matches.len() {
        0 => Err(Error::release_artifact_invalid(
            dir.join(prefix).to_string_lossy(),
            "Build script produced no file with the expected prefix",
        )),
        1 => {
            let path = matches.remove(0);
            log_status!("release", "Resolved artifact '{}'", path.display());
            Ok(path)
        }
        _ => Err(Error::release_artifact_invalid(
            dir.join(prefix).to_string_lossy(),
            format!(
                "Expected exactly one artifact, found {}: {}",
                matches.len(),
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )),
    }
}

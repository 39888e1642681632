use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Workflow file looked up at the workspace root when `--config` is absent.
pub const WORKFLOW_FILE: &str = "foreman.yml";

/// Base foreman state directory (`$FOREMAN_HOME`, else ~/.config/foreman).
pub fn foreman() -> Result<PathBuf> {
    if let Ok(home) = env::var("FOREMAN_HOME") {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&home).to_string()));
        }
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("foreman"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("foreman"))
    }
}

/// Environment cache root, unless the workflow overrides `cache.dir`.
pub fn cache() -> Result<PathBuf> {
    Ok(foreman()?.join("cache"))
}

/// Run-level job lock files
pub fn locks() -> Result<PathBuf> {
    Ok(foreman()?.join("locks"))
}

/// Last-run bookkeeping for scheduled jobs
pub fn schedule_state() -> Result<PathBuf> {
    Ok(foreman()?.join("schedule.json"))
}

/// Workflow file for a workspace root
pub fn workflow_file(root: &Path) -> PathBuf {
    root.join(WORKFLOW_FILE)
}

/// Expand `~` and resolve relative paths against `root`.
pub fn resolve_in(root: &Path, path: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file with standardized error handling.
pub fn write_file(path: &Path, content: &str, operation: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file atomically (write to .tmp, then rename).
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    ensure_dir(parent, operation)?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

pub fn ensure_dir(path: &Path, operation: &str) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Recursively copy `src` (file or directory) to `dest`, overwriting files
/// that already exist. Symlinks are recreated, not followed.
pub fn copy_recursive(src: &Path, dest: &Path, operation: &str) -> Result<u64> {
    let io_err = |e: std::io::Error, path: &Path| {
        Error::internal_io(
            format!("{}: {}", path.display(), e),
            Some(operation.to_string()),
        )
    };

    let meta = fs::symlink_metadata(src).map_err(|e| io_err(e, src))?;

    if meta.file_type().is_symlink() {
        let target = fs::read_link(src).map_err(|e| io_err(e, src))?;
        if fs::symlink_metadata(dest).is_ok() {
            fs::remove_file(dest).map_err(|e| io_err(e, dest))?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, dest).map_err(|e| io_err(e, dest))?;
        #[cfg(not(unix))]
        fs::copy(src, dest).map_err(|e| io_err(e, dest))?;
        return Ok(1);
    }

    if meta.is_file() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(e, parent))?;
        }
        fs::copy(src, dest).map_err(|e| io_err(e, dest))?;
        return Ok(1);
    }

    fs::create_dir_all(dest).map_err(|e| io_err(e, dest))?;
    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(|e| io_err(e, src))? {
        let entry = entry.map_err(|e| io_err(e, src))?;
        copied += copy_recursive(&entry.path(), &dest.join(entry.file_name()), operation)?;
    }
    Ok(copied)
}

use std::fs::{self, File};
use std::path::Path;

use serde::Serialize;

use crate::cache::sha256_hex;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
}

/// Hash the artifact and, when `verify` is set, confirm it opens as a zip
/// archive with at least one entry. Leading bytes such as an interpreter
/// line are tolerated.
pub fn inspect(path: &Path, verify: bool) -> Result<ArtifactInfo> {
    let display = path.to_string_lossy().to_string();
    let bytes = fs::read(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read artifact {}", display)))
    })?;

    let entries = if verify {
        let file = File::open(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("open artifact {}", display)))
        })?;
        let archive = zip::ZipArchive::new(file)
            .map_err(|e| Error::release_artifact_invalid(&display, format!("Not a zip archive: {}", e)))?;
        if archive.is_empty() {
            return Err(Error::release_artifact_invalid(&display, "Archive has no entries"));
        }
        Some(archive.len())
    } else {
        None
    };

    Ok(ArtifactInfo {
        path: display,
        size: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, shebang: bool) {
        let mut file = File::create(path).unwrap();
        if shebang {
            file.write_all(b"#!/usr/bin/env python3\n").unwrap();
        }
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("__main__.py", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"print('karrot')\n").unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn valid_archive_is_hashed_and_counted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("karrot-backend-master.pyz");
        write_zip(&path, false);

        let info = inspect(&path, true).unwrap();
        assert_eq!(info.entries, Some(1));
        assert_eq!(info.sha256.len(), 64);
        assert_eq!(info.size, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("karrot-backend-master.pyz");
        fs::write(&path, "not a zip").unwrap();

        let err = inspect(&path, true).unwrap_err();
        assert_eq!(err.code.as_str(), "release.artifact_invalid");
    }

    #[test]
    fn verification_can_be_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("karrot-backend-master.tar");
        fs::write(&path, "opaque").unwrap();

        let info = inspect(&path, false).unwrap();
        assert!(info.entries.is_none());
    }
}

//! Run-level lock per scheduled job.
//!
//! 1. Acquisition creates `<dir>/<job>.lock` exclusively, holding a
//!    [`LockInfo`] with an expiry.
//! 2. An existing lock that expired (or cannot be read) is taken over by
//!    renaming it aside first; only the contender whose rename moved the
//!    stale file it inspected may replace it.
//! 3. Lock files are written under a temporary name and hard-linked into
//!    place, so readers never see a partial file.
//! 4. Dropping the guard removes the file if it still names this holder.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, LockHeldDetails, Result};
use crate::utils::io;

/// Lock file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub job: String,
    pub holder_id: String,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    fn new(job: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            job: job.to_string(),
            holder_id: Uuid::new_v4().to_string(),
            pid: std::process::id(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct JobLock {
    path: PathBuf,
    info: LockInfo,
}

impl JobLock {
    pub fn acquire(dir: &Path, job: &str, ttl: Duration) -> Result<Self> {
        io::ensure_dir(dir, "create lock directory")?;
        let path = dir.join(format!("{}.lock", job));

        if let Some(lock) = try_create(&path, job, ttl)? {
            return Ok(lock);
        }

        let existing = read_info(&path);
        if let Some(info) = existing.as_ref().filter(|info| !info.is_expired()) {
            return Err(held(job, Some(info)));
        }

        let stale_holder = existing.map(|info| info.holder_id);
        if take_over(&path, stale_holder.as_deref()) {
            log_status!("lock", "Took over stale lock for {}", job);
        }

        try_create(&path, job, ttl)?.ok_or_else(|| held(job, read_info(&path).as_ref()))
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let ours = read_info(&self.path)
            .map(|info| info.holder_id == self.info.holder_id)
            .unwrap_or(false);
        if ours {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn held(job: &str, holder: Option<&LockInfo>) -> Error {
    Error::lock_held(LockHeldDetails {
        job: job.to_string(),
        holder_id: holder.map(|h| h.holder_id.clone()).unwrap_or_default(),
        expires_at: holder
            .map(|h| h.expires_at.to_rfc3339())
            .unwrap_or_default(),
    })
    .with_hint("Wait for the running job to finish or for its lock to expire")
}

/// Sibling path used to stage or retire a lock file.
fn side_path(path: &Path, tag: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}-{}", tag, Uuid::new_v4()));
    PathBuf::from(name)
}

/// Move the lock at `path` aside and delete it if it is still the stale
/// lock that was inspected (`None` for an unreadable file). A lock that
/// changed hands in between is linked back unless the slot was refilled.
fn take_over(path: &Path, stale_holder: Option<&str>) -> bool {
    let aside = side_path(path, "stale");
    if fs::rename(path, &aside).is_err() {
        return false;
    }

    let moved = read_info(&aside).map(|info| info.holder_id);
    if moved.as_deref() == stale_holder {
        let _ = fs::remove_file(&aside);
        return true;
    }

    let _ = fs::hard_link(&aside, path);
    let _ = fs::remove_file(&aside);
    false
}

/// `Ok(None)` when the file already exists.
fn try_create(path: &Path, job: &str, ttl: Duration) -> Result<Option<JobLock>> {
    let info = LockInfo::new(job, ttl);
    let raw = serde_json::to_string_pretty(&info)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize lock".to_string())))?;

    let staged = side_path(path, "new");
    let write = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staged)
        .and_then(|mut file| file.write_all(raw.as_bytes()));
    if let Err(e) = write {
        let _ = fs::remove_file(&staged);
        return Err(Error::internal_io(
            e.to_string(),
            Some(format!("write lock {}", staged.display())),
        ));
    }

    let linked = fs::hard_link(&staged, path);
    let _ = fs::remove_file(&staged);
    match linked {
        Ok(()) => Ok(Some(JobLock {
            path: path.to_path_buf(),
            info,
        })),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(Error::internal_io(
            e.to_string(),
            Some(format!("create lock {}", path.display())),
        )),
    }
}

fn read_info(path: &Path) -> Option<LockInfo> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_is_rejected_while_held() {
        let dir = TempDir::new().unwrap();
        let _held = JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap();

        let err = JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap_err();
        assert_eq!(err.code.as_str(), "lock.held");
        assert_eq!(err.details["job"], "locales");
    }

    #[test]
    fn different_jobs_do_not_conflict() {
        let dir = TempDir::new().unwrap();
        let _a = JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap();
        let _b = JobLock::acquire(dir.path(), "dependencies", Duration::minutes(10)).unwrap();
    }

    #[test]
    fn drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        {
            let lock = JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap();
            assert!(lock.path().exists());
        }
        assert!(!dir.path().join("locales.lock").exists());
        JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap();
    }

    #[test]
    fn expired_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let stale = JobLock::acquire(dir.path(), "locales", Duration::seconds(-1)).unwrap();
        assert!(stale.info().is_expired());

        let fresh = JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap();
        assert_ne!(fresh.info().holder_id, stale.info().holder_id);

        // The stale guard must not delete the new holder's file.
        drop(stale);
        assert!(fresh.path().exists());
    }

    #[test]
    fn concurrent_takeover_of_expired_lock_has_one_winner() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        for _ in 0..200 {
            let dir = TempDir::new().unwrap();
            std::mem::forget(
                JobLock::acquire(dir.path(), "locales", Duration::seconds(-1)).unwrap(),
            );

            let barrier = Arc::new(Barrier::new(2));
            let contenders: Vec<_> = (0..2)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    let dir = dir.path().to_path_buf();
                    thread::spawn(move || {
                        barrier.wait();
                        JobLock::acquire(&dir, "locales", Duration::minutes(10))
                    })
                })
                .collect();
            let results: Vec<_> = contenders.into_iter().map(|h| h.join().unwrap()).collect();

            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1);
            let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
            assert_eq!(loser.code.as_str(), "lock.held");
        }
    }

    #[test]
    fn no_staging_files_are_left_behind() {
        let dir = TempDir::new().unwrap();
        let stale = JobLock::acquire(dir.path(), "locales", Duration::seconds(-1)).unwrap();
        std::mem::forget(stale);
        let _fresh = JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["locales.lock".to_string()]);
    }

    #[test]
    fn unreadable_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("locales.lock"), "garbage").unwrap();
        assert!(JobLock::acquire(dir.path(), "locales", Duration::minutes(10)).is_ok());
    }
}

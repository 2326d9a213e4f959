//! Exclusive advisory lock on a target binary.
//!
//! The lock lives in a sidecar file (`<target>.lock`) next to the target.
//! The sidecar is never deleted: unlinking it while another process is
//! blocked on the same inode would let a third process lock a fresh file at
//! the same path, and two runs would then hold "the" lock at once.

use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const LOCK_SUFFIX: &str = ".lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Another run holds the lock on {path}")]
    Contended { path: PathBuf },

    #[error("Failed to open lock file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Held for as long as the target may be mutated. Released on drop; the
/// sidecar file stays behind.
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Take the lock without blocking.
    pub fn acquire(target: &Path) -> Result<Self, LockError> {
        let path = lock_path(target);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockError::Contended { path });
        }

        debug!(lock = %path.display(), "acquired target lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), %err, "failed to release lock");
        }
        debug!(lock = %self.path.display(), "released target lock");
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(LOCK_SUFFIX);
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            lock_path(Path::new("/usr/bin/chromium")),
            PathBuf::from("/usr/bin/chromium.lock")
        );
    }

    #[test]
    fn test_second_acquire_is_contended() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("binary");
        fs::write(&target, b"bytes").unwrap();

        let held = TargetLock::acquire(&target).unwrap();
        let second = TargetLock::acquire(&target);
        assert!(matches!(second, Err(LockError::Contended { .. })));
        drop(held);
    }

    #[test]
    fn test_lock_released_on_drop_and_file_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("binary");
        fs::write(&target, b"bytes").unwrap();

        let lock = TargetLock::acquire(&target).unwrap();
        let path = lock.path().to_path_buf();
        assert!(path.exists());
        drop(lock);

        assert!(path.exists());
        let again = TargetLock::acquire(&target);
        assert!(again.is_ok());
    }

    #[test]
    fn test_waiter_on_old_handle_still_excludes_new_acquire() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("binary");
        fs::write(&target, b"bytes").unwrap();

        let first = TargetLock::acquire(&target).unwrap();
        // A second process that opened the sidecar while `first` was held.
        let waiter = OpenOptions::new()
            .read(true)
            .write(true)
            .open(first.path())
            .unwrap();
        assert!(waiter.try_lock_exclusive().is_err());

        drop(first);
        waiter.try_lock_exclusive().unwrap();

        // The waiter holds the same inode a new run would open.
        let third = TargetLock::acquire(&target);
        assert!(matches!(third, Err(LockError::Contended { .. })));

        FileExt::unlock(&waiter).unwrap();
        assert!(TargetLock::acquire(&target).is_ok());
    }
}

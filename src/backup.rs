use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

/// Suffix appended to the target's file name to form the backup path.
pub const BACKUP_SUFFIX: &str = ".backup";

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to read {path} for backup: {source}")]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write backup {path}: {source}")]
    WriteBackup {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Backup {path} does not match its source (expected xxh3 {expected:016x}, found {found:016x})")]
    ChecksumMismatch {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    #[error("Path has no file name: {0}")]
    NoFileName(PathBuf),
}

/// What [`ensure_backup`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "BackupOutcome reports where the safety copy lives"]
pub enum BackupOutcome {
    /// A fresh copy of the target was written.
    Created { path: PathBuf, bytes: u64 },
    /// A backup from an earlier run was kept as-is.
    AlreadyExists { path: PathBuf },
}

impl BackupOutcome {
    pub fn path(&self) -> &Path {
        match self {
            BackupOutcome::Created { path, .. } | BackupOutcome::AlreadyExists { path } => path,
        }
    }
}

/// Derive the backup location for `target` (`<target>.backup`).
pub fn backup_path(target: &Path) -> Result<PathBuf, BackupError> {
    let name = target
        .file_name()
        .ok_or_else(|| BackupError::NoFileName(target.to_path_buf()))?;
    let mut backup_name = OsString::from(name);
    backup_name.push(BACKUP_SUFFIX);
    Ok(target.with_file_name(backup_name))
}

/// Make sure a pristine copy of `target` exists next to it.
///
/// An existing backup is never replaced: it holds the bytes from before the
/// first run, which is the state operators want to restore. A new backup is
/// staged in a temp file, checked against the source, and only then moved
/// into place, so a failed attempt leaves nothing behind.
pub fn ensure_backup(target: &Path) -> Result<BackupOutcome, BackupError> {
    let path = backup_path(target)?;

    if path.exists() {
        info!(backup = %path.display(), "backup already exists");
        return Ok(BackupOutcome::AlreadyExists { path });
    }

    let content = fs::read(target).map_err(|source| BackupError::ReadSource {
        path: target.to_path_buf(),
        source,
    })?;
    let metadata = fs::metadata(target).map_err(|source| BackupError::ReadSource {
        path: target.to_path_buf(),
        source,
    })?;

    let write_err = |source: std::io::Error| BackupError::WriteBackup {
        path: path.clone(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(&content).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    let expected = xxh3_64(&content);
    let staged = fs::read(temp.path()).map_err(write_err)?;
    let found = xxh3_64(&staged);
    if found != expected {
        return Err(BackupError::ChecksumMismatch {
            path: path.clone(),
            expected,
            found,
        });
    }

    fs::set_permissions(temp.path(), metadata.permissions()).map_err(write_err)?;

    // Refuses to overwrite, in case another process created the backup
    // between the exists() check and now.
    temp.persist_noclobber(&path).map_err(|e| write_err(e.error))?;

    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(&path, mtime).map_err(write_err)?;

    debug!(backup = %path.display(), checksum = expected, "backup verified");
    info!(backup = %path.display(), bytes = content.len(), "created backup");

    Ok(BackupOutcome::Created {
        path,
        bytes: content.len() as u64,
    })
}

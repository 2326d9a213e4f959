use crate::engine::ReplacementReport;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Bytes may already be on disk; restore from the backup.
    #[error("Size mismatch after writing {path}: expected {expected} bytes, found {found}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
}

/// Result of [`commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "CommitOutcome should be checked for written/skipped"]
pub enum CommitOutcome {
    /// The buffer was written and the on-disk size matches.
    Written { path: PathBuf, bytes: u64 },
    /// Nothing was replaced, so the file was left untouched.
    Skipped { path: PathBuf },
}

/// Write the mutated buffer back to `path` if the report shows any replacements.
///
/// The existing file is overwritten in place, so its inode, hard links,
/// ownership, permission bits and extended attributes are untouched. An
/// interrupted write can leave a mix of old and new bytes; the backup covers
/// that. After the write the on-disk size is compared with `expected_size`.
pub fn commit(
    path: &Path,
    buffer: &[u8],
    expected_size: u64,
    report: &ReplacementReport,
) -> Result<CommitOutcome, WriteError> {
    if !report.is_modified() {
        info!(file = %path.display(), "no replacements, leaving file untouched");
        return Ok(CommitOutcome::Skipped {
            path: path.to_path_buf(),
        });
    }

    let size_mismatch = |found: u64| WriteError::SizeMismatch {
        path: path.to_path_buf(),
        expected: expected_size,
        found,
    };

    if buffer.len() as u64 != expected_size {
        return Err(size_mismatch(buffer.len() as u64));
    }

    overwrite_in_place(path, buffer).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let found = fs::metadata(path)
        .map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if found != expected_size {
        return Err(size_mismatch(found));
    }

    info!(file = %path.display(), bytes = found, replacements = report.total(), "wrote sanitized file");
    Ok(CommitOutcome::Written {
        path: path.to_path_buf(),
        bytes: found,
    })
}

/// Open an existing file for rewriting: write access, no create, no truncate.
///
/// Fails with `ETXTBSY` on Linux while the file is being executed.
pub fn open_for_rewrite(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

fn overwrite_in_place(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = open_for_rewrite(path)?;
    file.write_all(content)?;
    file.sync_all()
}

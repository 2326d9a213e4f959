//! Target binary discovery.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::writer;

/// Locations checked, in order, when no explicit target is given.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
];

/// Executable looked up on `PATH` when no candidate matches.
pub const DEFAULT_FALLBACK: &str = "chromium";

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("Target binary not found (searched: {}; PATH lookup: {fallback})", format_candidates(.searched))]
    NotFound {
        searched: Vec<PathBuf>,
        fallback: String,
    },

    #[error("Target {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn format_candidates(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where to look for the target.
#[derive(Debug, Clone)]
pub struct Locator {
    candidates: Vec<PathBuf>,
    fallback: Option<String>,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
            fallback: Some(DEFAULT_FALLBACK.to_string()),
        }
    }
}

impl Locator {
    pub fn new(candidates: Vec<PathBuf>, fallback: Option<String>) -> Self {
        Self {
            candidates,
            fallback,
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Return the first candidate that exists and is writable, falling back
    /// to a `PATH` lookup. The result is canonicalized so a symlinked
    /// launcher resolves to the file that is actually rewritten.
    pub fn locate(&self) -> Result<PathBuf, LocateError> {
        for candidate in &self.candidates {
            if !candidate.exists() {
                continue;
            }
            match check_writable(candidate) {
                Ok(path) => return Ok(path),
                Err(err) => debug!(%err, "skipping candidate"),
            }
        }

        if let Some(name) = &self.fallback {
            if let Ok(found) = which::which(name) {
                debug!(path = %found.display(), "found target on PATH");
                match check_writable(&found) {
                    Ok(path) => return Ok(path),
                    Err(err) => debug!(%err, "PATH match rejected"),
                }
            }
        }

        Err(LocateError::NotFound {
            searched: self.candidates.clone(),
            fallback: self.fallback.clone().unwrap_or_default(),
        })
    }
}

/// Resolve an explicitly requested target, which must exist and be writable.
pub fn resolve_explicit(path: &Path) -> Result<PathBuf, LocateError> {
    if !path.exists() {
        return Err(LocateError::NotFound {
            searched: vec![path.to_path_buf()],
            fallback: String::new(),
        });
    }
    check_writable(path)
}

/// Canonicalize `path` and confirm it can be opened for writing.
///
/// Uses the same open as the in-place writer, without truncation, and closes
/// the file immediately. A binary that is currently running cannot be
/// rewritten in place (Linux refuses with `ETXTBSY`), so it is rejected here;
/// close the browser before sanitizing it.
pub fn check_writable(path: &Path) -> Result<PathBuf, LocateError> {
    let not_writable = |source: std::io::Error| LocateError::NotWritable {
        path: path.to_path_buf(),
        source,
    };
    let canonical = path.canonicalize().map_err(not_writable)?;
    writer::open_for_rewrite(&canonical).map_err(not_writable)?;
    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_existing_candidate_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing");
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        fs::write(&first, b"1").unwrap();
        fs::write(&second, b"2").unwrap();

        let locator = Locator::new(vec![missing, first.clone(), second], None);
        assert_eq!(locator.locate().unwrap(), first.canonicalize().unwrap());
    }

    #[test]
    fn test_nothing_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let locator = Locator::new(vec![temp_dir.path().join("missing")], None);
        let err = locator.locate().unwrap_err();
        assert!(matches!(err, LocateError::NotFound { ref searched, .. } if searched.len() == 1));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_fallback_name_that_does_not_exist() {
        let locator = Locator::new(
            Vec::new(),
            Some("binary-sanitizer-no-such-executable".to_string()),
        );
        assert!(matches!(
            locator.locate(),
            Err(LocateError::NotFound { .. })
        ));
    }

    #[test]
    fn test_explicit_target_must_exist() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = resolve_explicit(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(LocateError::NotFound { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_resolves_to_real_file() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let real = temp_dir.path().join("chrome");
        let link = temp_dir.path().join("chromium");
        fs::write(&real, b"bytes").unwrap();
        symlink(&real, &link).unwrap();

        assert_eq!(resolve_explicit(&link).unwrap(), real.canonicalize().unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_read_only_candidate_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("readonly");
        fs::write(&path, b"bytes").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o444)).unwrap();

        // Permission bits do not bind a privileged user.
        if fs::OpenOptions::new().write(true).open(&path).is_ok() {
            return;
        }

        let locator = Locator::new(vec![path], None);
        assert!(matches!(
            locator.locate(),
            Err(LocateError::NotFound { .. })
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_running_executable_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        use std::process::Command;

        let Ok(sleep) = which::which("sleep") else {
            return;
        };
        let temp_dir = tempfile::tempdir().unwrap();
        let busy = temp_dir.path().join("chromium");
        fs::copy(&sleep, &busy).unwrap();
        fs::set_permissions(&busy, fs::Permissions::from_mode(0o755)).unwrap();

        // Another test thread may briefly hold a forked copy of the write fd.
        let mut child = (0..10)
            .find_map(|_| match Command::new(&busy).arg("30").spawn() {
                Ok(child) => Some(child),
                Err(_) => {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    None
                }
            })
            .unwrap();
        let result = resolve_explicit(&busy);
        child.kill().unwrap();
        child.wait().unwrap();

        match result {
            Err(LocateError::NotWritable { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::ExecutableFileBusy);
            }
            other => panic!("expected NotWritable, got {other:?}"),
        }
        assert!(resolve_explicit(&busy).is_ok());
    }
}

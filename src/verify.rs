use crate::pattern::PatternSet;
use memchr::memmem;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Failed to read {path} for verification: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of scanning a file for surviving original sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Verification should be checked for clean/dirty"]
pub enum Verification {
    Clean,
    /// The first pattern whose original sequence is still present.
    Dirty { label: String },
}

impl Verification {
    pub fn is_clean(&self) -> bool {
        matches!(self, Verification::Clean)
    }
}

/// Scan `content` for any original sequence from `patterns`.
///
/// Patterns rejected by validation are checked too: their originals were
/// never removed, and the operator should know. Empty originals are ignored.
pub fn scan(content: &[u8], patterns: &PatternSet) -> Verification {
    for (label, original) in patterns.originals() {
        if original.is_empty() {
            continue;
        }
        if memmem::find(content, original).is_some() {
            info!(label, "original pattern still present");
            return Verification::Dirty {
                label: label.to_string(),
            };
        }
    }

    debug!("verification passed, no original patterns remain");
    Verification::Clean
}

/// Re-read `path` and [`scan`] it.
pub fn verify(path: &Path, patterns: &PatternSet) -> Result<Verification, VerifyError> {
    let content = fs::read(path).map_err(|source| VerifyError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(scan(&content, patterns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn patterns() -> PatternSet {
        PatternSet::new(vec![
            Pattern::new(b"alpha".to_vec(), b"ALPHA".to_vec(), "alpha"),
            Pattern::new(b"beta".to_vec(), b"BETA".to_vec(), "beta"),
        ])
    }

    #[test]
    fn test_clean_content() {
        assert!(scan(b"ALPHA BETA", &patterns()).is_clean());
    }

    #[test]
    fn test_reports_first_surviving_pattern() {
        let result = scan(b"ALPHA beta alpha", &patterns());
        assert_eq!(
            result,
            Verification::Dirty {
                label: "alpha".to_string()
            }
        );
    }

    #[test]
    fn test_rejected_pattern_still_counts() {
        let set = PatternSet::new(vec![Pattern::new(
            b"navigator.webdriver".to_vec(),
            b"navigator.v1_driverX".to_vec(),
            "mismatched",
        )]);
        let result = scan(b"xx navigator.webdriver yy", &set);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_empty_original_is_ignored() {
        let set = PatternSet::new(vec![Pattern::new(Vec::new(), Vec::new(), "empty")]);
        assert!(scan(b"anything", &set).is_clean());
    }

    #[test]
    fn test_verify_reads_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("binary");
        fs::write(&path, b"--beta--").unwrap();

        let result = verify(&path, &patterns()).unwrap();
        assert!(matches!(result, Verification::Dirty { ref label } if label == "beta"));
    }

    #[test]
    fn test_verify_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = verify(&temp_dir.path().join("missing"), &patterns());
        assert!(matches!(result, Err(VerifyError::Read { .. })));
    }
}

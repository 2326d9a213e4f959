use crate::config::schema::{PatternFile, ValidationError};
use crate::pattern::PatternSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read pattern file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse pattern file TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse pattern file TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid pattern file ({}): {}", path.display(), source),
                None => write!(f, "invalid pattern file: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatternSet, ConfigError> {
    let file: PatternFile = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    file.into_pattern_set()
        .map_err(|source| ConfigError::Validation { path: None, source })
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatternSet, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_text_patterns() {
        let set = load_from_str(
            r#"
[meta]
name = "chromium"

[[patterns]]
label = "webdriver"
original = "navigator.webdriver"
replacement = "navigator.v1_driver"
"#,
        )
        .unwrap();

        assert_eq!(set.len(), 1);
        let pattern = &set.patterns()[0];
        assert_eq!(pattern.label, "webdriver");
        assert_eq!(pattern.original, b"navigator.webdriver");
        assert_eq!(pattern.replacement, b"navigator.v1_driver");
    }

    #[test]
    fn test_length_mismatch_loads_but_fails_validation() {
        let set = load_from_str(
            r#"
[[patterns]]
original = "navigator.webdriver"
replacement = "navigator.v1_driver!"
"#,
        )
        .unwrap();

        let validated = set.validate();
        assert!(validated.is_empty());
        assert_eq!(validated.skipped[0].label, "navigator.webdriver");
    }

    #[test]
    fn test_invalid_hex_is_rejected() {
        let err = load_from_str(
            r#"
[[patterns]]
label = "bad"
original_hex = "zz"
replacement_hex = "00"
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Validation { path: None, .. }));
        assert!(err.to_string().contains("invalid 'original_hex'"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let err = load_from_str("").unwrap_err();
        assert!(err.to_string().contains("no patterns"));
    }

    #[test]
    fn test_malformed_toml() {
        let err = load_from_str("[[patterns]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn test_load_from_path_attaches_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("patterns.toml");
        fs::write(&path, "[[patterns]]\nlabel = \"x\"\n").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
        assert!(err.to_string().contains("patterns.toml"));
    }

    #[test]
    fn test_load_from_missing_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = load_from_path(temp_dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

use crate::pattern::{Pattern, PatternSet};
use serde::Deserialize;
use std::fmt;

/// On-disk pattern file.
///
/// ```toml
/// [meta]
/// name = "chromium"
///
/// [[patterns]]
/// label = "navigator.webdriver"
/// original = "navigator.webdriver"
/// replacement = "navigator.v1_driver"
/// ```
#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatternFile {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One rule as written in the file. Each side is given either as text or as hex.
#[derive(Debug, Deserialize, Clone)]
pub struct PatternDefinition {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub original_hex: Option<String>,
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub replacement_hex: Option<String>,
}

impl PatternDefinition {
    fn display_label(&self, index: usize) -> String {
        match &self.label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => match &self.original {
                Some(text) => text.clone(),
                None => format!("pattern #{}", index + 1),
            },
        }
    }
}

/// Which side of a rule an issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Original,
    Replacement,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Original => write!(f, "original"),
            Side::Replacement => write!(f, "replacement"),
        }
    }
}

impl PatternFile {
    /// Decode every definition into a [`PatternSet`].
    ///
    /// Only structural problems are reported here. Length mismatches between
    /// the two sides are left for [`PatternSet::validate`], which skips the
    /// pattern with a warning instead of rejecting the whole file.
    pub fn into_pattern_set(self) -> Result<PatternSet, ValidationError> {
        let mut issues = Vec::new();
        let mut patterns = Vec::with_capacity(self.patterns.len());

        if self.patterns.is_empty() {
            issues.push(ValidationIssue::EmptyPatternList);
        }

        for (index, def) in self.patterns.iter().enumerate() {
            let label = def.display_label(index);
            let original = decode_side(
                &label,
                Side::Original,
                def.original.as_deref(),
                def.original_hex.as_deref(),
                &mut issues,
            );
            let replacement = decode_side(
                &label,
                Side::Replacement,
                def.replacement.as_deref(),
                def.replacement_hex.as_deref(),
                &mut issues,
            );
            if let (Some(original), Some(replacement)) = (original, replacement) {
                patterns.push(Pattern::new(original, replacement, label));
            }
        }

        if issues.is_empty() {
            Ok(PatternSet::new(patterns))
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn decode_side(
    label: &str,
    side: Side,
    text: Option<&str>,
    hex_text: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Vec<u8>> {
    match (text, hex_text) {
        (Some(text), None) => Some(text.as_bytes().to_vec()),
        (None, Some(hex_text)) => {
            let compact: String = hex_text.chars().filter(|c| !c.is_whitespace()).collect();
            match hex::decode(&compact) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    issues.push(ValidationIssue::InvalidHex {
                        label: label.to_string(),
                        side,
                        message: err.to_string(),
                    });
                    None
                }
            }
        }
        (None, None) => {
            issues.push(ValidationIssue::MissingField {
                label: label.to_string(),
                side,
            });
            None
        }
        (Some(_), Some(_)) => {
            issues.push(ValidationIssue::ConflictingFields {
                label: label.to_string(),
                side,
            });
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatternList,
    MissingField {
        label: String,
        side: Side,
    },
    ConflictingFields {
        label: String,
        side: Side,
    },
    InvalidHex {
        label: String,
        side: Side,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatternList => write!(f, "pattern file contains no patterns"),
            ValidationIssue::MissingField { label, side } => {
                write!(f, "pattern '{label}' missing '{side}' (or '{side}_hex')")
            }
            ValidationIssue::ConflictingFields { label, side } => {
                write!(f, "pattern '{label}' sets both '{side}' and '{side}_hex'")
            }
            ValidationIssue::InvalidHex {
                label,
                side,
                message,
            } => write!(f, "pattern '{label}' has invalid '{side}_hex': {message}"),
        }
    }
}

//! Declarative byte-pattern rules and their validation.

use std::fmt;
use tracing::info;

/// A single same-length rewrite rule.
///
/// `original` is the byte sequence to erase, `replacement` is written over
/// each occurrence. Only patterns where both have the same length are ever
/// applied; see [`PatternSet::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub original: Vec<u8>,
    pub replacement: Vec<u8>,
    pub label: String,
}

impl Pattern {
    pub fn new(
        original: impl Into<Vec<u8>>,
        replacement: impl Into<Vec<u8>>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            original: original.into(),
            replacement: replacement.into(),
            label: label.into(),
        }
    }

    /// Check whether this pattern can be applied without changing the buffer length.
    pub fn check(&self) -> Result<(), SkipReason> {
        if self.original.is_empty() {
            return Err(SkipReason::EmptyOriginal);
        }
        if self.original.len() != self.replacement.len() {
            return Err(SkipReason::LengthMismatch {
                original: self.original.len(),
                replacement: self.replacement.len(),
            });
        }
        Ok(())
    }

    pub fn is_applicable(&self) -> bool {
        self.check().is_ok()
    }
}

/// Why a pattern was excluded from the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    LengthMismatch { original: usize, replacement: usize },
    EmptyOriginal,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LengthMismatch {
                original,
                replacement,
            } => write!(
                f,
                "mismatched lengths (original: {original} bytes, replacement: {replacement} bytes)"
            ),
            SkipReason::EmptyOriginal => write!(f, "original sequence is empty"),
        }
    }
}

/// A pattern that failed validation, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPattern {
    pub label: String,
    pub reason: SkipReason,
}

/// Ordered collection of rewrite rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// The default rule set for Chromium builds.
    pub fn builtin() -> Self {
        Self::new(vec![Pattern::new(
            b"navigator.webdriver".to_vec(),
            b"navigator.v1_driver".to_vec(),
            "navigator.webdriver -> navigator.v1_driver",
        )])
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every pattern's original sequence, including ones validation rejects.
    ///
    /// Verification checks all of these, not just the active set.
    pub fn originals(&self) -> impl Iterator<Item = (&str, &[u8])> + '_ {
        self.patterns
            .iter()
            .map(|p| (p.label.as_str(), p.original.as_slice()))
    }

    /// Split the set into the patterns that can be applied and those that
    /// cannot. Rejections are logged and reported, never errors: the remaining patterns
    /// still apply, and an empty active set just means nothing to do.
    pub fn validate(&self) -> ValidatedPatterns {
        let mut active = Vec::with_capacity(self.patterns.len());
        let mut skipped = Vec::new();

        for pattern in &self.patterns {
            match pattern.check() {
                Ok(()) => active.push(pattern.clone()),
                Err(reason) => {
                    info!(label = %pattern.label, %reason, "pattern excluded from active set");
                    skipped.push(SkippedPattern {
                        label: pattern.label.clone(),
                        reason,
                    });
                }
            }
        }

        ValidatedPatterns { active, skipped }
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Result of [`PatternSet::validate`].
#[derive(Debug, Clone, Default)]
pub struct ValidatedPatterns {
    /// Patterns safe to apply, in set order.
    pub active: Vec<Pattern>,
    pub skipped: Vec<SkippedPattern>,
}

impl ValidatedPatterns {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_patterns_are_valid() {
        let set = PatternSet::builtin();
        let validated = set.validate();
        assert_eq!(validated.active.len(), set.len());
        assert!(validated.skipped.is_empty());
    }

    #[test]
    fn test_length_mismatch_is_skipped() {
        let set = PatternSet::new(vec![
            Pattern::new(
                b"navigator.webdriver".to_vec(),
                b"navigator.v1_driverX".to_vec(),
                "too long",
            ),
            Pattern::new(b"abc".to_vec(), b"xyz".to_vec(), "ok"),
        ]);

        let validated = set.validate();
        assert_eq!(validated.active.len(), 1);
        assert_eq!(validated.active[0].label, "ok");
        assert_eq!(
            validated.skipped,
            vec![SkippedPattern {
                label: "too long".to_string(),
                reason: SkipReason::LengthMismatch {
                    original: 19,
                    replacement: 20,
                },
            }]
        );
    }

    #[test]
    fn test_empty_original_is_skipped() {
        let set = PatternSet::new(vec![Pattern::new(Vec::new(), Vec::new(), "empty")]);
        let validated = set.validate();
        assert!(validated.is_empty());
        assert_eq!(validated.skipped[0].reason, SkipReason::EmptyOriginal);
    }

    #[test]
    fn test_empty_set_validates_to_nothing() {
        let validated = PatternSet::default().validate();
        assert!(validated.is_empty());
        assert!(validated.skipped.is_empty());
    }

    #[test]
    fn test_originals_include_rejected_patterns() {
        let set = PatternSet::new(vec![
            Pattern::new(b"aa".to_vec(), b"b".to_vec(), "bad"),
            Pattern::new(b"cc".to_vec(), b"dd".to_vec(), "good"),
        ]);
        let originals: Vec<_> = set.originals().collect();
        assert_eq!(
            originals,
            vec![("bad", b"aa".as_slice()), ("good", b"cc".as_slice())]
        );
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::LengthMismatch {
            original: 19,
            replacement: 20,
        };
        assert_eq!(
            reason.to_string(),
            "mismatched lengths (original: 19 bytes, replacement: 20 bytes)"
        );
    }
}

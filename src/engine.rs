//! In-place, same-length byte replacement.
//!
//! The engine never changes the length of the buffer it is given: it works on
//! `&mut [u8]`, which cannot grow or shrink, and every write is a
//! `copy_from_slice` over a region of exactly the original's length. Absolute
//! offsets elsewhere in the file stay valid after a run.
//!
//! Patterns are applied one after another in set order. Bytes written by one
//! pattern are visible to the patterns after it, so a replacement that happens
//! to spell a later pattern's original will be rewritten again. Reorder the
//! set if that matters.

use crate::pattern::Pattern;
use memchr::memmem::Finder;
use tracing::{debug, info, warn};

/// Match count for one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternCount {
    pub label: String,
    pub matches: usize,
}

/// Per-pattern match counts, in the order the patterns were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use = "ReplacementReport decides whether the buffer needs to be written"]
pub struct ReplacementReport {
    pub counts: Vec<PatternCount>,
}

impl ReplacementReport {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.matches).sum()
    }

    /// Whether anything was rewritten.
    pub fn is_modified(&self) -> bool {
        self.total() > 0
    }

    pub fn matches_for(&self, label: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.matches)
    }
}

/// Apply every pattern to `buffer` and report how many times each matched.
///
/// Patterns that cannot be applied without resizing are counted as zero and
/// leave the buffer alone, so passing an unvalidated set is still safe.
pub fn apply(buffer: &mut [u8], patterns: &[Pattern]) -> ReplacementReport {
    let mut report = ReplacementReport {
        counts: Vec::with_capacity(patterns.len()),
    };

    for pattern in patterns {
        let matches = match pattern.check() {
            Ok(()) => replace_all(buffer, &pattern.original, &pattern.replacement),
            Err(reason) => {
                warn!(label = %pattern.label, %reason, "skipping pattern");
                0
            }
        };

        if matches > 0 {
            info!(label = %pattern.label, matches, "replaced occurrences");
        } else {
            debug!(label = %pattern.label, "no matches (may already be sanitized)");
        }

        report.counts.push(PatternCount {
            label: pattern.label.clone(),
            matches,
        });
    }

    report
}

/// Overwrite every non-overlapping occurrence of `original`, scanning left to right.
///
/// After a match at `i` the scan resumes at `i + len`, so freshly written
/// bytes are never re-examined for the same pattern.
fn replace_all(buffer: &mut [u8], original: &[u8], replacement: &[u8]) -> usize {
    debug_assert_eq!(original.len(), replacement.len());

    let len = original.len();
    if len == 0 || len > buffer.len() {
        return 0;
    }

    let finder = Finder::new(original);
    let mut cursor = 0;
    let mut matches = 0;

    while cursor <= buffer.len() - len {
        let Some(offset) = finder.find(&buffer[cursor..]) else {
            break;
        };
        let start = cursor + offset;
        buffer[start..start + len].copy_from_slice(replacement);
        matches += 1;
        cursor = start + len;
    }

    matches
}

/// Count non-overlapping occurrences without modifying anything.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() {
        return 0;
    }
    Finder::new(needle).find_iter(haystack).count()
}

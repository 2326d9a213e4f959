//! Binary Sanitizer: same-length byte-pattern rewriting for compiled executables
//!
//! Rewrites a binary in place, replacing known byte sequences with
//! equal-length substitutes so the file's signature changes while its size
//! and every byte offset stay the same.
//!
//! # Architecture
//!
//! A run is a straight line of phases, each with its own outcome type:
//!
//! 1. [`locate`] resolves the target path.
//! 2. [`backup::ensure_backup`] writes `<target>.backup` once and never again.
//! 3. The whole file is loaded into a `Vec<u8>`.
//! 4. [`engine::apply`] rewrites matches in place and returns a [`ReplacementReport`].
//! 5. [`writer::commit`] writes the buffer back if anything changed.
//! 6. [`verify::verify`] re-reads the file and looks for surviving originals.
//!
//! [`Sanitizer`] drives these phases. The engine itself is a pure function of
//! `(buffer, patterns)`, so it can be tested without touching the filesystem.
//!
//! # Safety
//!
//! - Only same-length patterns are applied; others are skipped and reported
//! - The backup is verified before it is moved into place
//! - In-place overwrite (inode, links and ownership kept) with a post-write size check
//! - Exclusive advisory lock on the target from backup through write
//! - Idempotent: a second run finds nothing to replace
//!
//! # Example
//!
//! ```
//! use binary_sanitizer::{engine, Pattern};
//!
//! let mut buffer = b"xx navigator.webdriver yy".to_vec();
//! let patterns = [Pattern::new(
//!     b"navigator.webdriver".to_vec(),
//!     b"navigator.v1_driver".to_vec(),
//!     "webdriver",
//! )];
//!
//! let report = engine::apply(&mut buffer, &patterns);
//! assert_eq!(report.total(), 1);
//! assert_eq!(buffer, b"xx navigator.v1_driver yy");
//! ```

pub mod backup;
pub mod config;
pub mod engine;
pub mod locate;
pub mod lock;
pub mod orchestrator;
pub mod pattern;
pub mod verify;
pub mod writer;

// Re-exports
pub use backup::{backup_path, ensure_backup, BackupError, BackupOutcome};
pub use config::{load_from_path, load_from_str, ConfigError};
pub use engine::{PatternCount, ReplacementReport};
pub use locate::{LocateError, Locator};
pub use lock::{LockError, TargetLock};
pub use orchestrator::{exit_code, Phase, RunSummary, SanitizeError, Sanitizer, Target};
pub use pattern::{Pattern, PatternSet, SkipReason, SkippedPattern, ValidatedPatterns};
pub use verify::{Verification, VerifyError};
pub use writer::{CommitOutcome, WriteError};

//! Run sequencing: locate, backup, load, replace, write, verify.
//!
//! Each phase produces an explicit outcome and [`Phase::advance`] maps that
//! outcome to the next phase. Nothing runs concurrently and no phase calls
//! back into an earlier one.

use crate::backup::{self, BackupError, BackupOutcome};
use crate::engine::{self, ReplacementReport};
use crate::locate::{self, LocateError, Locator};
use crate::lock::{LockError, TargetLock};
use crate::pattern::{PatternSet, SkippedPattern};
use crate::verify::{self, Verification, VerifyError};
use crate::writer::{self, CommitOutcome, WriteError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// A step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Locate,
    Backup,
    Load,
    Replace,
    Write,
    Verify,
    Done,
    Failed,
}

impl Phase {
    /// Next phase given whether the current one succeeded.
    ///
    /// Replace has no failure outcome. Done and Failed are terminal.
    pub fn advance(self, succeeded: bool) -> Phase {
        if !succeeded && self != Phase::Replace {
            return Phase::Failed;
        }
        match self {
            Phase::Locate => Phase::Backup,
            Phase::Backup => Phase::Load,
            Phase::Load => Phase::Replace,
            Phase::Replace => Phase::Write,
            Phase::Write => Phase::Verify,
            Phase::Verify => Phase::Done,
            Phase::Done => Phase::Done,
            Phase::Failed => Phase::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Locate => "locate",
            Phase::Backup => "backup",
            Phase::Load => "load",
            Phase::Replace => "replace",
            Phase::Write => "write",
            Phase::Verify => "verify",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("Failed to read {path}: {source}")]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl SanitizeError {
    /// The phase that failed.
    pub fn phase(&self) -> Phase {
        match self {
            SanitizeError::Locate(_) => Phase::Locate,
            SanitizeError::Lock(_) | SanitizeError::Backup(_) => Phase::Backup,
            SanitizeError::Load { .. } => Phase::Load,
            SanitizeError::Write(_) => Phase::Write,
            SanitizeError::Verify(_) => Phase::Verify,
        }
    }

    /// Whether the target may already hold new bytes and should be restored
    /// from its backup.
    pub fn target_may_be_modified(&self) -> bool {
        matches!(self, SanitizeError::Write(WriteError::SizeMismatch { .. }))
    }
}

/// Where the target comes from.
#[derive(Debug, Clone)]
pub enum Target {
    /// Use this path; it must exist and be writable.
    Explicit(PathBuf),
    /// Search candidate locations.
    Discover(Locator),
}

impl Default for Target {
    fn default() -> Self {
        Target::Discover(Locator::default())
    }
}

/// Everything a completed run did, whether or not verification passed.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub target: PathBuf,
    pub backup: BackupOutcome,
    pub original_size: u64,
    pub skipped: Vec<SkippedPattern>,
    pub report: ReplacementReport,
    pub commit: CommitOutcome,
    pub verification: Verification,
    pub phase: Phase,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

/// Map a run result to the process exit status: 0 only when the run reached Done.
pub fn exit_code(result: &Result<RunSummary, SanitizeError>) -> i32 {
    match result {
        Ok(summary) => summary.exit_code(),
        Err(_) => 1,
    }
}

/// Drives one sanitization run.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    patterns: PatternSet,
    target: Target,
}

impl Sanitizer {
    pub fn new(patterns: PatternSet, target: Target) -> Self {
        Self { patterns, target }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Resolve the target path.
    pub fn locate(&self) -> Result<PathBuf, LocateError> {
        match &self.target {
            Target::Explicit(path) => locate::resolve_explicit(path),
            Target::Discover(locator) => locator.locate(),
        }
    }

    /// Run every phase against the configured target.
    ///
    /// Fatal failures return `Err`. A run that wrote successfully but still
    /// finds an original sequence returns `Ok` with `phase == Phase::Failed`:
    /// the write is not rolled back.
    pub fn run(&self) -> Result<RunSummary, SanitizeError> {
        let mut phase = Phase::Locate;
        let target = settle(&mut phase, self.locate().map_err(SanitizeError::from))?;
        info!(target_path = %target.display(), "found target binary");
        self.run_from(&target, phase)
    }

    /// Run every phase after LOCATE against `target`.
    pub fn run_on(&self, target: &Path) -> Result<RunSummary, SanitizeError> {
        self.run_from(target, Phase::Backup)
    }

    fn run_from(&self, target: &Path, mut phase: Phase) -> Result<RunSummary, SanitizeError> {
        debug_assert_eq!(phase, Phase::Backup);

        let validated = self.patterns.validate();

        // The lock is held from BACKUP through WRITE.
        let (lock, backup) = settle(&mut phase, lock_and_backup(target))?;

        let loaded = fs::read(target).map_err(|source| SanitizeError::Load {
            path: target.to_path_buf(),
            source,
        });
        let mut buffer = settle(&mut phase, loaded)?;
        let original_size = buffer.len() as u64;
        info!(bytes = original_size, "loaded target");

        let report = engine::apply(&mut buffer, &validated.active);
        phase = phase.advance(true);

        let written = writer::commit(target, &buffer, original_size, &report);
        let commit = settle(&mut phase, written.map_err(SanitizeError::from))?;
        drop(buffer);
        drop(lock);

        let verified = verify::verify(target, &self.patterns).map_err(SanitizeError::from);
        let verification = settle_if(&mut phase, verified, Verification::is_clean)?;
        if phase == Phase::Failed {
            info!("verification failed, target may not be fully sanitized");
        }

        debug_assert!(phase.is_terminal());

        Ok(RunSummary {
            target: target.to_path_buf(),
            backup,
            original_size,
            skipped: validated.skipped,
            report,
            commit,
            verification,
            phase,
        })
    }

    /// Read-only check: locate the target and verify it without touching it.
    pub fn check(&self) -> Result<(PathBuf, Verification), SanitizeError> {
        let target = self.locate()?;
        let verification = verify::verify(&target, &self.patterns)?;
        Ok((target, verification))
    }
}

fn lock_and_backup(target: &Path) -> Result<(TargetLock, BackupOutcome), SanitizeError> {
    let lock = TargetLock::acquire(target)?;
    let backup = backup::ensure_backup(target)?;
    Ok((lock, backup))
}

/// Advance `phase` past a step that succeeds whenever it returns `Ok`.
fn settle<T>(phase: &mut Phase, result: Result<T, SanitizeError>) -> Result<T, SanitizeError> {
    settle_if(phase, result, |_| true)
}

/// Advance `phase` by the step's outcome. An `Err`, or an `Ok` value that
/// `succeeded` rejects, moves the run to `Failed`.
fn settle_if<T>(
    phase: &mut Phase,
    result: Result<T, SanitizeError>,
    succeeded: impl FnOnce(&T) -> bool,
) -> Result<T, SanitizeError> {
    let current = *phase;
    *phase = current.advance(result.as_ref().is_ok_and(succeeded));
    if let Err(err) = &result {
        debug_assert_eq!(err.phase(), current);
        debug!(phase = %current, %err, "phase failed");
    }
    result
}

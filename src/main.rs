use anyhow::Result;
use binary_sanitizer::{
    config::load_from_path, exit_code, BackupOutcome, CommitOutcome, Locator, PatternSet,
    RunSummary, SanitizeError, Sanitizer, Target, Verification,
};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "binary-sanitizer")]
#[command(
    about = "Rewrite identifying byte sequences in a binary without changing its size",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Binary to sanitize (searched in the default locations if not specified)
    #[arg(short, long, env = "BINARY_SANITIZER_TARGET")]
    target: Option<PathBuf>,

    /// TOML pattern file (the built-in patterns are used if not specified)
    #[arg(short, long)]
    patterns: Option<PathBuf>,

    /// Only verify the target; do not back up or modify it
    #[arg(long)]
    check: bool,

    /// Show diagnostic logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let patterns = match &cli.patterns {
        Some(path) => load_from_path(path)?,
        None => PatternSet::builtin(),
    };

    let target = match cli.target {
        Some(path) => Target::Explicit(path),
        None => Target::Discover(Locator::default()),
    };

    let sanitizer = Sanitizer::new(patterns, target);

    let code = if cli.check {
        cmd_check(&sanitizer)
    } else {
        cmd_sanitize(&sanitizer)
    };

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_sanitize(sanitizer: &Sanitizer) -> i32 {
    println!("{}", "Binary Sanitizer".bold());
    println!("Patterns: {}", sanitizer.patterns().len());
    println!();

    let result = sanitizer.run();
    match &result {
        Ok(summary) => print_summary(summary),
        Err(err) => print_failure(sanitizer, err),
    }
    exit_code(&result)
}

fn print_summary(summary: &RunSummary) {
    println!("Target: {}", summary.target.display());

    match &summary.backup {
        BackupOutcome::Created { path, .. } => {
            println!("{} Created backup: {}", "✓".green(), path.display())
        }
        BackupOutcome::AlreadyExists { path } => {
            println!("{} Backup already exists: {}", "⊙".yellow(), path.display())
        }
    }

    println!("Binary size: {} bytes", summary.original_size);
    println!();

    for skipped in &summary.skipped {
        eprintln!(
            "{} {}: Skipped ({})",
            "⊘".cyan(),
            skipped.label,
            skipped.reason
        );
    }

    for count in &summary.report.counts {
        if count.matches > 0 {
            println!(
                "{} {}: {} replacement(s)",
                "✓".green(),
                count.label,
                count.matches
            );
        } else {
            println!(
                "{} {}: No matches found (may already be sanitized)",
                "⊙".yellow(),
                count.label
            );
        }
    }

    println!();
    match &summary.commit {
        CommitOutcome::Written { bytes, .. } => println!(
            "{} Wrote {} total replacement(s), final size {} bytes (unchanged)",
            "✓".green(),
            summary.report.total(),
            bytes
        ),
        CommitOutcome::Skipped { .. } => println!(
            "{} No sanitization needed, file left untouched",
            "⊙".yellow()
        ),
    }

    print_verification(&summary.verification);
}

fn print_verification(verification: &Verification) {
    match verification {
        Verification::Clean => {
            println!("{} Verification passed: no original patterns remain", "✓".green())
        }
        Verification::Dirty { label } => {
            eprintln!(
                "{} Verification failed: original pattern still present: {}",
                "✗".red(),
                label
            );
            eprintln!("  The binary may not be fully sanitized.");
        }
    }
}

fn print_failure(sanitizer: &Sanitizer, err: &SanitizeError) {
    eprintln!("{} {} failed: {}", "✗".red(), err.phase(), err);

    match err {
        SanitizeError::Locate(_) => {
            if let Target::Discover(locator) = sanitizer.target() {
                eprintln!("  Searched paths:");
                for path in locator.candidates() {
                    eprintln!("    - {}", path.display());
                }
            }
            eprintln!("  Try: binary-sanitizer --target /path/to/binary");
        }
        _ if err.target_may_be_modified() => {
            eprintln!(
                "  {}",
                "The target may be partially written. Restore it from its .backup file.".red()
            );
        }
        _ => {}
    }
}

fn cmd_check(sanitizer: &Sanitizer) -> i32 {
    println!("{}", "Verifying target...".bold());

    match sanitizer.check() {
        Ok((target, verification)) => {
            println!("Target: {}", target.display());
            print_verification(&verification);
            if verification.is_clean() {
                0
            } else {
                1
            }
        }
        Err(err) => {
            print_failure(sanitizer, &err);
            1
        }
    }
}

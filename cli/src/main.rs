//! DateSort - Command-line interface for the date-based file organizer.
//!
//! Sorts the files of one directory into per-day folders under another.
//! Results go to stdout (one line per file, or JSON lines); logs and the
//! summary go to stderr.

use clap::Parser;
use datesort_engine::{
    ChecksumAlgorithm, DateFormat, Organizer, RunConfig, RunSummary, TransferMode,
    TransferResult, TransferStatus,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// DateSort - Organize files into folders by date
#[derive(Parser, Debug)]
#[command(name = "datesort")]
#[command(version = "0.1.0")]
#[command(about = "Sort files into one folder per day, by capture or file date")]
struct Args {
    /// Source directory
    #[arg(long, value_name = "PATH")]
    src: PathBuf,

    /// Destination directory (created if missing)
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// Folder name format: DD-MM-YYYY, MM-DD-YYYY or YYYY-MM-DD
    #[arg(long, value_name = "FORMAT", default_value = "DD-MM-YYYY")]
    format: String,

    /// Operation mode: copy or move
    #[arg(long, value_name = "MODE", default_value = "copy")]
    mode: String,

    /// Descend into subdirectories of the source
    #[arg(long)]
    recursive: bool,

    /// Ignore files whose name starts with a dot
    #[arg(long)]
    skip_hidden: bool,

    /// Checksum algorithm for duplicate detection and move verification: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", default_value = "blake3")]
    hash: String,

    /// Show where files would go without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse and validate command-line arguments, then run the organizer
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn build_config(args: &Args) -> Result<RunConfig, String> {
    let date_format: DateFormat = args.format.parse()?;
    let mode: TransferMode = args.mode.parse()?;
    let algorithm: ChecksumAlgorithm = args.hash.parse()?;

    Ok(RunConfig::new(&args.src, &args.dst, date_format, mode)
        .with_recursive(args.recursive)
        .with_compare_with(algorithm)
        .with_include_hidden(!args.skip_hidden))
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = build_config(args)?;
    let organizer = Organizer::new();

    if args.dry_run {
        return print_preview(&organizer, &config, args.json);
    }

    let started = Instant::now();
    let mut run = organizer
        .run(config)
        .map_err(|e| format!("Run rejected: {}", e))?;

    if !args.json {
        eprintln!("Organizing {} entries...", run.remaining());
        eprintln!("  Source: {}", run.config().source_root.display());
        eprintln!("  Destination: {}", run.config().destination_root.display());
        eprintln!(
            "  Mode: {}, folders: {}",
            run.config().mode,
            run.config().date_format
        );
        eprintln!();
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for result in run.by_ref() {
        print_result(&mut out, &result, args.json).map_err(|e| e.to_string())?;
    }

    let summary = run.finish();
    print_summary(&summary, started.elapsed());

    if summary.has_failures() {
        Err(format!("{} file(s) failed to transfer", summary.failed))
    } else {
        Ok(())
    }
}

fn print_result(out: &mut impl Write, result: &TransferResult, json: bool) -> io::Result<()> {
    if json {
        let line = serde_json::to_string(result).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        return writeln!(out, "{}", line);
    }

    let source = result.source_path.display();
    match (result.status, &result.destination_path) {
        (TransferStatus::Succeeded, Some(dest)) => writeln!(out, "{} -> {}", source, dest.display()),
        (TransferStatus::Skipped, Some(existing)) => writeln!(
            out,
            "{}: {} (already at {})",
            source,
            result.describe(),
            existing.display()
        ),
        _ => writeln!(out, "{}: {}", source, result.describe()),
    }
}

fn print_summary(summary: &RunSummary, elapsed: Duration) {
    eprintln!();
    if summary.cancelled {
        eprintln!("Run cancelled.");
    } else {
        eprintln!("Run complete!");
    }
    eprintln!(
        "Summary: {} organized, {} skipped ({} duplicates), {} failed",
        summary.succeeded, summary.skipped, summary.duplicates, summary.failed
    );
    eprintln!("Bytes written: {}", format_bytes(summary.bytes_written));
    eprintln!("Elapsed: {}", format_duration(elapsed));
}

fn print_preview(organizer: &Organizer, config: &RunConfig, json: bool) -> Result<(), String> {
    let plan = organizer
        .preview(config)
        .map_err(|e| format!("Run rejected: {}", e))?;

    if json {
        let text = serde_json::to_string_pretty(&plan).map_err(|e| e.to_string())?;
        println!("{}", text);
        return Ok(());
    }

    let total: usize = plan.values().map(Vec::len).sum();
    println!(
        "{} file(s) would be sorted into {} folder(s) under {}",
        total,
        plan.len(),
        config.destination_root.display()
    );
    for (folder, files) in &plan {
        println!("{}/", folder);
        for file in files {
            let name = file
                .source_path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            println!("  {} ({}, {})", name, file.date_source, format_bytes(file.size));
        }
    }
    Ok(())
}

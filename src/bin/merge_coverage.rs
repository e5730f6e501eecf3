//! Coverage merger binary.
//!
//! Walks a coverage report directory, merges the per-build lcov traces and
//! writes `coverage_overview.csv`. Exits with status 1 on any failure,
//! including a missing or invalid directory argument.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "merge-coverage",
    version,
    about = "Merge per-build lcov traces into a coverage overview CSV"
)]
struct Cli {
    /// Coverage report directory with one subdirectory per build, each
    /// containing an lcov trace (.info) file
    coverage_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(dir) = cli.coverage_dir else {
        eprintln!("Syntax error. Missing the coverage report directory path.");
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(1);
    };
    if !dir.is_dir() {
        eprintln!("Error: Directory '{}' cannot be found.", dir.display());
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(1);
    }

    match run(&dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(dir: &Path) -> anyhow::Result<()> {
    covsheet::merge::merge_coverage(dir)
        .with_context(|| format!("Coverage merge in '{}' failed", dir.display()))?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

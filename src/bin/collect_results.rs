//! Result collector binary.
//!
//! Joins the CSV artifacts in a results directory into `results.xlsx`. Exits
//! with status 1 on any failure, including a missing or invalid directory
//! argument.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "collect-results",
    version,
    about = "Collect build result CSVs into a results.xlsx workbook"
)]
struct Cli {
    /// Results directory holding buildsOverview.csv, buildAccesses.csv and
    /// coverage_overview.csv (each optional)
    results_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(dir) = cli.results_dir else {
        eprintln!("Syntax error. Missing the results directory path.");
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
    covsheet::collect::collect_results(dir)
        .with_context(|| format!("Result collection in '{}' failed", dir.display()))?;
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

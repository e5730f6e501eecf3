//! Wrapper around the external `lcov` tool.
//!
//! The merger never reads trace files itself: per-trace figures come from
//! `lcov --summary <trace>` (human-readable output parsed with two fixed
//! patterns) and the merged trace from `lcov -a <t1> -a <t2> ... -o <out>`.
//! Coverage percentages are recomputed from the covered/max integers rather
//! than trusted from the tool's printed value, which avoids rounding
//! mismatches between lcov versions.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use tracing::warn;

use crate::core::errors::{CovsheetError, Result};

/// Default name of the external coverage tool binary.
pub const LCOV_PROGRAM: &str = "lcov";

/// Marker expected on stdout of a `lcov --version` probe.
const VERSION_MARKER: &str = "LCOV version";

static LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"lines\.+: ([0-9.]+)% \((\d+) of (\d+) lines\)").unwrap());
static FUNCTIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"functions\.+: ([0-9.]+)% \((\d+) of (\d+) functions\)").unwrap());

/// Covered/instrumented pair for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    /// Items hit at least once.
    pub covered: u64,
    /// Items instrumented in total.
    pub total: u64,
}

impl Counts {
    /// Coverage fraction in [0, 1], rounded to 4 decimal places.
    /// Zero instrumented items yield 0.0 rather than a division error.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.covered as f64 / self.total as f64;
        (raw * 10_000.0).round() / 10_000.0
    }
}

/// Line and function figures extracted from one `lcov --summary` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageTotals {
    /// Line coverage counts.
    pub lines: Counts,
    /// Function coverage counts.
    pub functions: Counts,
}

/// Captured result of one tool invocation: exit status, stdout and stderr
/// as three distinct values.
#[derive(Debug)]
pub struct ToolOutput {
    /// Whether the tool exited successfully.
    pub success: bool,
    /// Decoded standard output.
    pub stdout: String,
    /// Decoded error output.
    pub stderr: String,
}

/// Handle for invoking the external lcov binary.
#[derive(Debug, Clone)]
pub struct LcovTool {
    program: PathBuf,
}

impl Default for LcovTool {
    fn default() -> Self {
        Self::new(LCOV_PROGRAM)
    }
}

impl LcovTool {
    /// Create a tool handle for the given binary name or path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Probe the tool with a version query; true when the binary responds
    /// with the expected version marker on stdout.
    pub fn is_available(&self) -> bool {
        self.run(&[OsString::from("--version")])
            .map(|output| output.stdout.contains(VERSION_MARKER))
            .unwrap_or(false)
    }

    /// Run `lcov --summary <trace>` and extract the line/function figures.
    pub fn summary(&self, trace: &Path) -> Result<CoverageTotals> {
        let args = [OsString::from("--summary"), trace.as_os_str().to_owned()];
        let output = self.run(&args)?;
        if !output.stderr.trim().is_empty() {
            warn!(
                "lcov --summary for '{}' reported: {}",
                trace.display(),
                output.stderr.trim()
            );
        }
        parse_summary(&output.stdout).map_err(|err| {
            if output.success {
                err
            } else {
                CovsheetError::tool_with_stderr(
                    format!("lcov --summary failed for '{}'", trace.display()),
                    output.stderr.trim().to_string(),
                )
            }
        })
    }

    /// Run the additive merge `lcov -a <t1> -a <t2> ... -o <out>`.
    pub fn merge(&self, traces: &[PathBuf], out_path: &Path) -> Result<()> {
        let mut args = Vec::with_capacity(traces.len() * 2 + 2);
        for trace in traces {
            args.push(OsString::from("-a"));
            args.push(trace.as_os_str().to_owned());
        }
        args.push(OsString::from("-o"));
        args.push(out_path.as_os_str().to_owned());

        let output = self.run(&args)?;
        if !output.stderr.trim().is_empty() {
            warn!("lcov merge reported: {}", output.stderr.trim());
        }
        if !output.success {
            return Err(CovsheetError::tool_with_stderr(
                format!("lcov merge into '{}' failed", out_path.display()),
                output.stderr.trim().to_string(),
            ));
        }
        Ok(())
    }

    /// Invoke the tool with an argument vector, blocking until it exits.
    fn run(&self, args: &[OsString]) -> Result<ToolOutput> {
        let output = Command::new(&self.program).args(args).output().map_err(|err| {
            CovsheetError::io(
                format!("Failed to invoke '{}'", self.program.display()),
                err,
            )
        })?;

        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Parse the human-readable `lcov --summary` output.
pub fn parse_summary(text: &str) -> Result<CoverageTotals> {
    let lines = extract_counts(&LINES_RE, text).ok_or_else(|| {
        CovsheetError::parse("lcov summary output contains no line coverage figures")
    })?;
    let functions = extract_counts(&FUNCTIONS_RE, text).ok_or_else(|| {
        CovsheetError::parse("lcov summary output contains no function coverage figures")
    })?;

    Ok(CoverageTotals { lines, functions })
}

fn extract_counts(pattern: &Regex, text: &str) -> Option<Counts> {
    let captures = pattern.captures(text)?;
    // Group 1 is the tool's printed percentage; deliberately ignored.
    let covered = captures.get(2)?.as_str().parse().ok()?;
    let total = captures.get(3)?.as_str().parse().ok()?;
    Some(Counts { covered, total })
}

/// One discovered coverage trace, identified by its build tag.
///
/// The summary figures are computed lazily and memoized so the external tool
/// is invoked exactly once per report.
#[derive(Debug)]
pub struct CoverageReport {
    /// Build tag (the subdirectory name, or `Collectively` for the merge).
    pub tag: String,
    /// Path to the lcov trace file.
    pub trace_path: PathBuf,
    totals: OnceCell<CoverageTotals>,
}

impl CoverageReport {
    /// Create a report for `tag` backed by the trace at `trace_path`.
    pub fn new(tag: impl Into<String>, trace_path: impl Into<PathBuf>) -> Self {
        Self {
            tag: tag.into(),
            trace_path: trace_path.into(),
            totals: OnceCell::new(),
        }
    }

    /// Line/function figures for this trace, invoking the tool on first use.
    pub fn totals(&self, tool: &LcovTool) -> Result<&CoverageTotals> {
        self.totals.get_or_try_init(|| tool.summary(&self.trace_path))
    }
}

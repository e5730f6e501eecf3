//! Coverage merger pipeline.
//!
//! Walks the immediate subdirectories of a coverage root, picks the first
//! `.info` trace file in each, merges all traces into `merged.info` via the
//! external lcov tool, and writes `coverage_overview.csv` with one row per
//! build tag followed by the `Collectively` aggregate row.

pub mod lcov;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::errors::{CovsheetError, Result};
use crate::core::records::COLLECTIVE_TAG;
use lcov::{CoverageReport, LcovTool};

/// File name of the merged trace written into the coverage root.
pub const MERGED_TRACE_FILE_NAME: &str = "merged.info";

/// File name of the coverage overview CSV written into the coverage root.
pub const COVERAGE_OVERVIEW_FILE_NAME: &str = "coverage_overview.csv";

/// Extension of the per-build trace files the merger looks for.
const TRACE_EXTENSION: &str = "info";

#[derive(Serialize)]
struct OverviewCsvRow<'a> {
    #[serde(rename = "Tag")]
    tag: &'a str,
    #[serde(rename = "Lines Covered")]
    lines_covered: u64,
    #[serde(rename = "Lines Max")]
    lines_max: u64,
    #[serde(rename = "Lines Coverage")]
    line_coverage: String,
    #[serde(rename = "Functions Covered")]
    functions_covered: u64,
    #[serde(rename = "Functions Max")]
    functions_max: u64,
    #[serde(rename = "Function Coverage")]
    function_coverage: String,
}

/// Discover one coverage report per immediate subdirectory of `root`.
///
/// Subdirectories are visited in sorted name order; within each, the first
/// `.info` file (again in sorted name order) wins. Subdirectories without a
/// trace file are skipped silently.
pub fn discover_reports(root: &Path) -> Result<Vec<CoverageReport>> {
    let mut subdirs: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|err| {
            CovsheetError::io(format!("Cannot read directory '{}'", root.display()), err)
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    let mut reports = Vec::new();
    for dir in subdirs {
        let Some(tag) = dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if let Some(trace) = first_trace_file(&dir)? {
            reports.push(CoverageReport::new(tag, trace));
        }
    }

    Ok(reports)
}

fn first_trace_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| {
            CovsheetError::io(format!("Cannot read directory '{}'", dir.display()), err)
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext == TRACE_EXTENSION)
        })
        .collect();
    files.sort();

    Ok(files.into_iter().next())
}

/// Run the full merger pipeline on `root`.
///
/// Fails when no subdirectory yields a trace file. A missing lcov binary is
/// only a warning here; the individual invocations surface their own errors.
/// Returns the path of the written overview CSV.
pub fn merge_coverage(root: &Path) -> Result<PathBuf> {
    let tool = LcovTool::default();
    if !tool.is_available() {
        warn!(
            "lcov was not found on this system; coverage extraction will fail. \
             On Ubuntu run: sudo apt update && sudo apt install lcov"
        );
    }

    let reports = discover_reports(root)?;
    if reports.is_empty() {
        return Err(CovsheetError::validation(format!(
            "No coverage data found in path '{}'",
            root.display()
        )));
    }

    for report in &reports {
        let totals = report.totals(&tool)?;
        info!(
            "Processed '{}': {}/{} lines ({:.4}), {}/{} functions ({:.4})",
            report.tag,
            totals.lines.covered,
            totals.lines.total,
            totals.lines.fraction(),
            totals.functions.covered,
            totals.functions.total,
            totals.functions.fraction(),
        );
    }

    info!("Merging {} coverage traces...", reports.len());
    let merged_path = root.join(MERGED_TRACE_FILE_NAME);
    let trace_paths: Vec<PathBuf> = reports
        .iter()
        .map(|report| report.trace_path.clone())
        .collect();
    tool.merge(&trace_paths, &merged_path)?;
    let merged = CoverageReport::new(COLLECTIVE_TAG, merged_path);

    write_overview_csv(root, &tool, &reports, &merged)
}

/// Write the coverage overview CSV: one row per discovered report in
/// discovery order, then the aggregate row last.
fn write_overview_csv(
    root: &Path,
    tool: &LcovTool,
    reports: &[CoverageReport],
    merged: &CoverageReport,
) -> Result<PathBuf> {
    let out_path = root.join(COVERAGE_OVERVIEW_FILE_NAME);
    let mut writer = csv::Writer::from_path(&out_path).map_err(|err| {
        CovsheetError::csv(format!("Cannot write '{}'", out_path.display()), err)
    })?;

    for report in reports.iter().chain(std::iter::once(merged)) {
        let totals = report.totals(tool)?;
        writer.serialize(OverviewCsvRow {
            tag: &report.tag,
            lines_covered: totals.lines.covered,
            lines_max: totals.lines.total,
            line_coverage: format!("{:.4}", totals.lines.fraction()),
            functions_covered: totals.functions.covered,
            functions_max: totals.functions.total,
            function_coverage: format!("{:.4}", totals.functions.fraction()),
        })?;
    }
    writer.flush().map_err(|err| {
        CovsheetError::io(format!("Cannot flush '{}'", out_path.display()), err)
    })?;

    info!("Done! Output file: '{}'", out_path.display());
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discovers_first_trace_per_subdirectory_in_sorted_order() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("buildB")).unwrap();
        fs::write(root.path().join("buildB/coverage.info"), "TN:\n").unwrap();
        fs::create_dir(root.path().join("buildA")).unwrap();
        fs::write(root.path().join("buildA/zz.info"), "TN:\n").unwrap();
        fs::write(root.path().join("buildA/aa.info"), "TN:\n").unwrap();
        // Subdirectory without a trace file is skipped.
        fs::create_dir(root.path().join("empty")).unwrap();
        // Plain files in the root are ignored.
        fs::write(root.path().join("stray.info"), "TN:\n").unwrap();

        let reports = discover_reports(root.path()).unwrap();
        let tags: Vec<&str> = reports.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, vec!["buildA", "buildB"]);
        assert!(reports[0].trace_path.ends_with("buildA/aa.info"));
    }

    #[test]
    fn subdirectories_with_other_extensions_are_skipped() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("build1")).unwrap();
        fs::write(root.path().join("build1/notes.txt"), "x").unwrap();

        let reports = discover_reports(root.path()).unwrap();
        assert!(reports.is_empty());
    }

    #[test]
    fn merge_fails_fatally_when_no_reports_are_discovered() {
        let root = tempdir().unwrap();
        let err = merge_coverage(root.path()).unwrap_err();
        assert!(matches!(err, CovsheetError::Validation { .. }));
        assert!(err.to_string().contains("No coverage data"));
    }

    #[test]
    fn discovery_on_missing_directory_is_an_io_error() {
        let err = discover_reports(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, CovsheetError::Io { .. }));
    }
}

//! Result collector pipeline.
//!
//! Joins up to three CSV sources from a results directory by build tag and
//! renders a four-sheet `results.xlsx` workbook. Every source is optional: a
//! missing file downgrades to a warning and leaves its sheet empty, while the
//! `Summary` sheet is always rendered from whatever records the present
//! sources produced.

pub mod sources;
pub mod workbook;

use std::path::{Path, PathBuf};

use csv::StringRecord;
use rust_xlsxwriter::Workbook;
use tracing::{info, warn};

use crate::core::errors::{CovsheetError, Result};
use crate::core::records::RecordSet;
use sources::{ACCESSES_FILE_NAME, COVERAGE_FILE_NAME, OVERVIEW_FILE_NAME};
use workbook::{
    render_access_sheet, render_coverage_sheet, render_overview_sheet, render_summary_sheet,
    CellStyles, SummaryHeader,
};

/// File name of the workbook written into the results directory.
pub const OUTPUT_FILE_NAME: &str = "results.xlsx";

const COVERAGE_SHEET: &str = "Coverage";
const OVERVIEW_SHEET: &str = "Build Overview";
const ACCESS_SHEET: &str = "Build Accesses";
const SUMMARY_SHEET: &str = "Summary";

/// Run the full collector pipeline on `dir`.
///
/// Reads `coverage_overview.csv`, `buildsOverview.csv` and
/// `buildAccesses.csv` (each optional), reconciles their rows into one record
/// per build tag, and writes `results.xlsx` next to the inputs. Returns the
/// path of the written workbook.
pub fn collect_results(dir: &Path) -> Result<PathBuf> {
    let styles = CellStyles::new();
    let mut records = RecordSet::new();
    let mut header = SummaryHeader::new();
    let mut workbook = Workbook::new();

    let coverage_rows = read_source(dir, COVERAGE_FILE_NAME, COVERAGE_SHEET)?;
    let overview_rows = read_source(dir, OVERVIEW_FILE_NAME, OVERVIEW_SHEET)?;
    let access_rows = read_source(dir, ACCESSES_FILE_NAME, ACCESS_SHEET)?;

    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(COVERAGE_SHEET)?;
        if let Some(rows) = &coverage_rows {
            info!("Processing '{}'", COVERAGE_FILE_NAME);
            render_coverage_sheet(worksheet, rows, &mut records, &mut header, &styles)?;
        }
    }
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(OVERVIEW_SHEET)?;
        if let Some(rows) = &overview_rows {
            info!("Processing '{}'", OVERVIEW_FILE_NAME);
            render_overview_sheet(worksheet, rows, &mut records, &mut header, &styles)?;
        }
    }
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(ACCESS_SHEET)?;
        if let Some(rows) = &access_rows {
            info!("Processing '{}'", ACCESSES_FILE_NAME);
            render_access_sheet(worksheet, rows, &mut records, &mut header, &styles)?;
        }
    }
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SUMMARY_SHEET)?;
        render_summary_sheet(worksheet, &records, &header, &styles)?;
    }

    let out_path = dir.join(OUTPUT_FILE_NAME);
    workbook.save(&out_path).map_err(|err| {
        CovsheetError::spreadsheet(
            format!(
                "Cannot write '{}' (is it open in another program?)",
                out_path.display()
            ),
            err,
        )
    })?;

    info!("Done! Output file: '{}'", out_path.display());
    Ok(out_path)
}

/// Read one optional CSV source. A missing or unreadable file is a warning
/// and yields `None`; malformed content is an error.
fn read_source(dir: &Path, file_name: &str, sheet_name: &str) -> Result<Option<Vec<StringRecord>>> {
    let path = dir.join(file_name);
    if !path.is_file() {
        warn!(
            "Cannot find '{}'; the {} sheet will stay empty",
            path.display(),
            sheet_name
        );
        return Ok(None);
    }
    match read_csv_rows(&path) {
        Ok(rows) => Ok(Some(rows)),
        Err(err) if is_skippable(&err) => {
            warn!(
                "Cannot read '{}'; the {} sheet will stay empty",
                path.display(),
                sheet_name
            );
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Whether a source error means the file could not be opened or read at the
/// I/O level (e.g. permission denied), as opposed to holding malformed
/// content. I/O failures on an optional source are skipped, not fatal.
fn is_skippable(err: &CovsheetError) -> bool {
    matches!(
        err,
        CovsheetError::Csv { source, .. } if matches!(source.kind(), csv::ErrorKind::Io(_))
    )
}

/// Read all rows of a CSV file, header row included. The reader is strict:
/// every row must have the same number of fields as the first.
fn read_csv_rows(path: &Path) -> Result<Vec<StringRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| CovsheetError::csv(format!("Cannot open '{}'", path.display()), err))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record.map_err(|err| {
            CovsheetError::csv(format!("Malformed row in '{}'", path.display()), err)
        })?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_header_and_data_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("buildAccesses.csv");
        fs::write(&path, "Tag,Accesses\nbuildA,3\nTotal,3\n").unwrap();

        let rows = read_csv_rows(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][0], "Tag");
        assert_eq!(&rows[1][1], "3");
    }

    #[test]
    fn rejects_rows_with_inconsistent_field_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("buildAccesses.csv");
        fs::write(&path, "Tag,Accesses\nbuildA,3,extra\n").unwrap();

        let err = read_csv_rows(&path).unwrap_err();
        assert!(matches!(err, CovsheetError::Csv { .. }));
    }

    #[test]
    fn io_failures_on_present_sources_are_skippable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CovsheetError::csv("Cannot open 'buildAccesses.csv'", csv::Error::from(io_err));
        assert!(is_skippable(&err));
    }

    #[test]
    fn malformed_content_is_not_skippable() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader("Tag,Accesses\nbuildA\n".as_bytes());
        let csv_err = reader.records().nth(1).unwrap().unwrap_err();
        let err = CovsheetError::csv("Malformed row", csv_err);
        assert!(!is_skippable(&err));
    }

    #[test]
    fn collect_on_empty_directory_still_writes_the_workbook() {
        let dir = tempdir().unwrap();
        let out = collect_results(dir.path()).unwrap();
        assert!(out.ends_with(OUTPUT_FILE_NAME));
        assert!(out.is_file());
    }

    #[test]
    fn collect_joins_the_present_sources() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(OVERVIEW_FILE_NAME),
            "No,Tag,BuildTime,weak-ssl\n1,buildA,12:00,FLAG_SET\n2,buildB,12:05,FLAG_NOT_SET\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(ACCESSES_FILE_NAME),
            "Tag,Accesses\nbuildB,7\nbuildA,3\nTotal,10\n",
        )
        .unwrap();

        let out = collect_results(dir.path()).unwrap();
        assert!(out.is_file());
        assert!(fs::metadata(&out).unwrap().len() > 0);
    }

    #[test]
    fn collect_with_all_three_sources() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(COVERAGE_FILE_NAME),
            "Tag,Lines Covered,Lines Max,Lines Coverage,Functions Covered,Functions Max,Function Coverage\n\
             buildA,80,100,0.8000,8,10,0.8000\n\
             Collectively,80,100,0.8000,8,10,0.8000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(OVERVIEW_FILE_NAME),
            "No,Tag,BuildTime\n1,buildA,12:00\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(ACCESSES_FILE_NAME),
            "Tag,Accesses\nbuildA,3\nTotal,3\n",
        )
        .unwrap();

        let out = collect_results(dir.path()).unwrap();
        assert!(out.is_file());
    }

    #[test]
    fn collect_fails_on_malformed_source() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(ACCESSES_FILE_NAME),
            "Tag,Accesses\nbuildA,many\n",
        )
        .unwrap();

        let err = collect_results(dir.path()).unwrap_err();
        assert!(matches!(err, CovsheetError::Validation { .. }));
    }
}

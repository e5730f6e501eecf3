//! Typed parsing of the three collector CSV inputs.
//!
//! Each source is comma-delimited UTF-8 with a header row first:
//!
//! - overview: `No,Tag,BuildTime,<option_1>,...,<option_k>`
//! - access:   `Tag,Accesses` (one row tagged `Total`)
//! - coverage: `Tag,Lines Covered,Lines Max,Lines Coverage,Functions Covered,
//!   Functions Max,Function Coverage` (one row tagged `Collectively`)

use csv::StringRecord;

use crate::core::errors::{CovsheetError, Result};

/// Expected file name of the build overview CSV.
pub const OVERVIEW_FILE_NAME: &str = "buildsOverview.csv";

/// Expected file name of the build access CSV.
pub const ACCESSES_FILE_NAME: &str = "buildAccesses.csv";

/// Expected file name of the coverage overview CSV (the merger's output).
pub const COVERAGE_FILE_NAME: &str = "coverage_overview.csv";

/// Raw token marking a set configuration flag in overview option columns.
pub const FLAG_SET: &str = "FLAG_SET";

/// Raw token marking an unset configuration flag in overview option columns.
pub const FLAG_NOT_SET: &str = "FLAG_NOT_SET";

/// Display classification of one option cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagCell<'a> {
    /// `FLAG_SET`, rendered as "Yes" in the accent color.
    Set,
    /// `FLAG_NOT_SET`, rendered as "No" in the other accent color.
    NotSet,
    /// Any other option value, passed through unchanged.
    Plain(&'a str),
}

/// Classify an option cell value for rendering.
pub fn classify_flag(value: &str) -> FlagCell<'_> {
    match value {
        FLAG_SET => FlagCell::Set,
        FLAG_NOT_SET => FlagCell::NotSet,
        other => FlagCell::Plain(other),
    }
}

/// One data row of the coverage overview source.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRow {
    /// Build tag, or `Collectively` for the aggregate row.
    pub tag: String,
    /// Covered line count.
    pub lines_covered: u64,
    /// Instrumented line count.
    pub lines_max: u64,
    /// Line coverage fraction in [0, 1].
    pub line_coverage: f64,
    /// Covered function count.
    pub functions_covered: u64,
    /// Instrumented function count.
    pub functions_max: u64,
    /// Function coverage fraction in [0, 1].
    pub function_coverage: f64,
}

impl CoverageRow {
    /// Coerce a raw CSV record into a coverage row.
    pub fn parse(record: &StringRecord) -> Result<Self> {
        Ok(Self {
            tag: field(record, 0, "Tag")?.to_string(),
            lines_covered: int_field(record, 1, "Lines Covered")?,
            lines_max: int_field(record, 2, "Lines Max")?,
            line_coverage: float_field(record, 3, "Lines Coverage")?,
            functions_covered: int_field(record, 4, "Functions Covered")?,
            functions_max: int_field(record, 5, "Functions Max")?,
            function_coverage: float_field(record, 6, "Function Coverage")?,
        })
    }
}

/// One data row of the build overview source.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewRow {
    /// Build ordinal.
    pub sequence: i64,
    /// Build tag.
    pub tag: String,
    /// Opaque build timestamp display value.
    pub build_time: String,
    /// Option values, positionally aligned with the header's option columns.
    pub options: Vec<String>,
}

impl OverviewRow {
    /// Coerce a raw CSV record into an overview row.
    pub fn parse(record: &StringRecord) -> Result<Self> {
        Ok(Self {
            sequence: field(record, 0, "No")?.trim().parse().map_err(|err| {
                CovsheetError::validation_field(format!("Invalid build ordinal: {err}"), "No")
            })?,
            tag: field(record, 1, "Tag")?.to_string(),
            build_time: field(record, 2, "BuildTime")?.to_string(),
            options: record.iter().skip(3).map(str::to_string).collect(),
        })
    }
}

/// One data row of the build access source.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRow {
    /// Build tag, or `Total` for the aggregate row.
    pub tag: String,
    /// Number of build-server accesses.
    pub accesses: u64,
}

impl AccessRow {
    /// Coerce a raw CSV record into an access row.
    pub fn parse(record: &StringRecord) -> Result<Self> {
        Ok(Self {
            tag: field(record, 0, "Tag")?.to_string(),
            accesses: int_field(record, 1, "Accesses")?,
        })
    }
}

fn field<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str> {
    record.get(index).ok_or_else(|| {
        CovsheetError::validation_field(format!("Missing column {index}"), name)
    })
}

fn int_field(record: &StringRecord, index: usize, name: &str) -> Result<u64> {
    field(record, index, name)?.trim().parse().map_err(|err| {
        CovsheetError::validation_field(format!("Invalid integer: {err}"), name)
    })
}

fn float_field(record: &StringRecord, index: usize, name: &str) -> Result<f64> {
    field(record, index, name)?.trim().parse().map_err(|err| {
        CovsheetError::validation_field(format!("Invalid float: {err}"), name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    #[test]
    fn parses_coverage_row() {
        let row = CoverageRow::parse(&record(&[
            "buildA", "80", "100", "0.8000", "8", "10", "0.8000",
        ]))
        .unwrap();
        assert_eq!(row.tag, "buildA");
        assert_eq!(row.lines_covered, 80);
        assert_eq!(row.lines_max, 100);
        assert_eq!(row.line_coverage, 0.8);
        assert_eq!(row.functions_covered, 8);
        assert_eq!(row.functions_max, 10);
        assert_eq!(row.function_coverage, 0.8);
    }

    #[test]
    fn coverage_row_with_bad_integer_is_rejected() {
        let err = CoverageRow::parse(&record(&[
            "buildA", "eighty", "100", "0.8", "8", "10", "0.8",
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            CovsheetError::Validation { field: Some(ref f), .. } if f == "Lines Covered"
        ));
    }

    #[test]
    fn coverage_row_with_missing_columns_is_rejected() {
        let err = CoverageRow::parse(&record(&["buildA", "80"])).unwrap_err();
        assert!(matches!(err, CovsheetError::Validation { .. }));
    }

    #[test]
    fn parses_overview_row_with_option_columns() {
        let row = OverviewRow::parse(&record(&[
            "3",
            "buildA",
            "2022-01-02 03:04",
            "FLAG_SET",
            "FLAG_NOT_SET",
            "tls1_3",
        ]))
        .unwrap();
        assert_eq!(row.sequence, 3);
        assert_eq!(row.tag, "buildA");
        assert_eq!(row.build_time, "2022-01-02 03:04");
        assert_eq!(row.options, vec!["FLAG_SET", "FLAG_NOT_SET", "tls1_3"]);
    }

    #[test]
    fn overview_row_without_options_is_valid() {
        let row = OverviewRow::parse(&record(&["1", "b1", "12:00"])).unwrap();
        assert!(row.options.is_empty());
    }

    #[test]
    fn parses_access_row() {
        let row = AccessRow::parse(&record(&["buildA", "17"])).unwrap();
        assert_eq!(row.tag, "buildA");
        assert_eq!(row.accesses, 17);
    }

    #[test]
    fn access_row_with_bad_count_is_rejected() {
        let err = AccessRow::parse(&record(&["buildA", "many"])).unwrap_err();
        assert!(matches!(
            err,
            CovsheetError::Validation { field: Some(ref f), .. } if f == "Accesses"
        ));
    }

    #[test]
    fn classifies_flag_tokens() {
        assert_eq!(classify_flag("FLAG_SET"), FlagCell::Set);
        assert_eq!(classify_flag("FLAG_NOT_SET"), FlagCell::NotSet);
        assert_eq!(classify_flag("tls1_3"), FlagCell::Plain("tls1_3"));
        // Only the exact tokens are substituted.
        assert_eq!(classify_flag("flag_set"), FlagCell::Plain("flag_set"));
    }
}

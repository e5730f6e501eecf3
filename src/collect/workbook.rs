//! Spreadsheet rendering for the result collector.
//!
//! All cells use the Consolas font; headers and aggregate rows are bold;
//! coverage fractions carry the `0.00%` number format so the stored value
//! stays a fraction while the display shows a percentage. Column widths are
//! derived from the longest stringified cell per column, and each populated
//! sheet gets an auto-filter whose span is chosen per sheet (the coverage
//! sheet keeps its aggregate row outside the filter so it stays visible).

use csv::StringRecord;
use rust_xlsxwriter::{Color, Format, FormatAlign, Worksheet};
use tracing::warn;

use crate::collect::sources::{classify_flag, AccessRow, CoverageRow, FlagCell, OverviewRow};
use crate::core::errors::{CovsheetError, Result};
use crate::core::records::{BuildRecord, RecordSet, COLLECTIVE_TAG, TOTAL_TAG};

const FONT_NAME: &str = "Consolas";
const PERCENT_FORMAT: &str = "0.00%";

// Dark green for set flags, orange for unset ones.
const FLAG_SET_COLOR: Color = Color::RGB(0x76933C);
const FLAG_NOT_SET_COLOR: Color = Color::RGB(0xE26B0A);

const MIN_COLUMN_WIDTH: f64 = 5.0;
const COLUMN_WIDTH_FACTOR: f64 = 1.2;

/// Number of fixed (non-option) columns in the summary sheet.
const SUMMARY_FIXED_COLUMNS: usize = 10;

/// Auto-filter span for one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSpan {
    /// Filter covers every populated row.
    AllRows,
    /// Filter stops one row short, keeping the final aggregate row visible
    /// regardless of the active filter.
    ExcludeLastRow,
}

/// Pre-built cell formats shared by all sheets.
pub(crate) struct CellStyles {
    text: Format,
    text_bold: Format,
    text_right: Format,
    text_right_bold: Format,
    text_center: Format,
    text_center_bold: Format,
    percent: Format,
    percent_bold: Format,
    flag_yes: Format,
    flag_yes_bold: Format,
    flag_no: Format,
    flag_no_bold: Format,
}

/// Formats for the cells of one row, bold or regular.
pub(crate) struct RowStyles<'a> {
    text: &'a Format,
    right: &'a Format,
    center: &'a Format,
    percent: &'a Format,
    flag_yes: &'a Format,
    flag_no: &'a Format,
}

fn base() -> Format {
    Format::new().set_font_name(FONT_NAME)
}

impl CellStyles {
    pub(crate) fn new() -> Self {
        Self {
            text: base(),
            text_bold: base().set_bold(),
            text_right: base().set_align(FormatAlign::Right),
            text_right_bold: base().set_align(FormatAlign::Right).set_bold(),
            text_center: base().set_align(FormatAlign::Center),
            text_center_bold: base().set_align(FormatAlign::Center).set_bold(),
            percent: base().set_num_format(PERCENT_FORMAT),
            percent_bold: base().set_num_format(PERCENT_FORMAT).set_bold(),
            flag_yes: base()
                .set_font_color(FLAG_SET_COLOR)
                .set_align(FormatAlign::Center),
            flag_yes_bold: base()
                .set_font_color(FLAG_SET_COLOR)
                .set_align(FormatAlign::Center)
                .set_bold(),
            flag_no: base()
                .set_font_color(FLAG_NOT_SET_COLOR)
                .set_align(FormatAlign::Center),
            flag_no_bold: base()
                .set_font_color(FLAG_NOT_SET_COLOR)
                .set_align(FormatAlign::Center)
                .set_bold(),
        }
    }

    fn row(&self, bold: bool) -> RowStyles<'_> {
        if bold {
            RowStyles {
                text: &self.text_bold,
                right: &self.text_right_bold,
                center: &self.text_center_bold,
                percent: &self.percent_bold,
                flag_yes: &self.flag_yes_bold,
                flag_no: &self.flag_no_bold,
            }
        } else {
            RowStyles {
                text: &self.text,
                right: &self.text_right,
                center: &self.text_center,
                percent: &self.percent,
                flag_yes: &self.flag_yes,
                flag_no: &self.flag_no,
            }
        }
    }
}

/// Worksheet wrapper that tracks the populated rectangle and the longest
/// stringified value per column, for auto-filter and column sizing.
pub(crate) struct SheetWriter<'a> {
    worksheet: &'a mut Worksheet,
    widths: Vec<usize>,
    rows: u32,
    cols: u16,
}

impl<'a> SheetWriter<'a> {
    pub(crate) fn new(worksheet: &'a mut Worksheet) -> Self {
        Self {
            worksheet,
            widths: Vec::new(),
            rows: 0,
            cols: 0,
        }
    }

    pub(crate) fn write_text(
        &mut self,
        row: u32,
        col: u16,
        value: &str,
        format: &Format,
    ) -> Result<()> {
        self.worksheet
            .write_string_with_format(row, col, value, format)?;
        self.track(row, col, value.chars().count());
        Ok(())
    }

    pub(crate) fn write_number(
        &mut self,
        row: u32,
        col: u16,
        value: f64,
        format: &Format,
    ) -> Result<()> {
        self.worksheet
            .write_number_with_format(row, col, value, format)?;
        self.track(row, col, display_len(value));
        Ok(())
    }

    fn track(&mut self, row: u32, col: u16, len: usize) {
        self.rows = self.rows.max(row + 1);
        self.cols = self.cols.max(col + 1);
        if len > 0 {
            let idx = col as usize;
            if self.widths.len() <= idx {
                self.widths.resize(idx + 1, 0);
            }
            self.widths[idx] = self.widths[idx].max(len);
        }
    }

    /// Attach the auto-filter and size every populated column.
    pub(crate) fn finish(self, span: FilterSpan) -> Result<()> {
        if self.rows > 0 && self.cols > 0 {
            let last_row = filter_last_row(self.rows, span);
            self.worksheet.autofilter(0, 0, last_row, self.cols - 1)?;
        }
        for (idx, longest) in self.widths.iter().enumerate() {
            if *longest > 0 {
                self.worksheet
                    .set_column_width(idx as u16, column_width(*longest))?;
            }
        }
        Ok(())
    }
}

fn filter_last_row(rows: u32, span: FilterSpan) -> u32 {
    match span {
        FilterSpan::AllRows => rows - 1,
        FilterSpan::ExcludeLastRow => rows.saturating_sub(2),
    }
}

/// Width heuristic: 1.2 times the longest stringified cell, at least 5.
fn column_width(longest: usize) -> f64 {
    (COLUMN_WIDTH_FACTOR * longest as f64).max(MIN_COLUMN_WIDTH)
}

/// Length of a number the way a spreadsheet user reads it: integers without
/// a decimal point, fractions in their shortest representation.
fn display_len(value: f64) -> usize {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64).len()
    } else {
        format!("{}", value).len()
    }
}

/// Summary-sheet header assembled from the headers of the processed sources.
///
/// The overview source contributes columns 0-2 and the option names, the
/// coverage source columns 3-8, the access source column 9. Cells from
/// absent sources stay blank.
pub(crate) struct SummaryHeader {
    cells: [String; SUMMARY_FIXED_COLUMNS],
    options: Vec<String>,
}

impl SummaryHeader {
    pub(crate) fn new() -> Self {
        Self {
            cells: Default::default(),
            options: Vec::new(),
        }
    }

    pub(crate) fn cells(&self) -> &[String] {
        &self.cells
    }

    pub(crate) fn options(&self) -> &[String] {
        &self.options
    }

    fn absorb_coverage(&mut self, header: &StringRecord) {
        if let Some(tag) = header.get(0) {
            self.cells[1] = tag.to_string();
        }
        for idx in 1..=6 {
            if let Some(name) = header.get(idx) {
                self.cells[idx + 2] = name.to_string();
            }
        }
    }

    fn absorb_overview(&mut self, header: &StringRecord) {
        for idx in 0..3 {
            if let Some(name) = header.get(idx) {
                self.cells[idx] = name.to_string();
            }
        }
        self.options = header.iter().skip(3).map(str::to_string).collect();
    }

    fn absorb_access(&mut self, header: &StringRecord) {
        if let Some(tag) = header.get(0) {
            self.cells[1] = tag.to_string();
        }
        if let Some(accesses) = header.get(1) {
            self.cells[9] = accesses.to_string();
        }
    }
}

fn write_option_cell(
    sheet: &mut SheetWriter<'_>,
    row: u32,
    col: u16,
    value: &str,
    cell: &RowStyles<'_>,
) -> Result<()> {
    match classify_flag(value) {
        FlagCell::Set => sheet.write_text(row, col, "Yes", cell.flag_yes),
        FlagCell::NotSet => sheet.write_text(row, col, "No", cell.flag_no),
        FlagCell::Plain(other) => sheet.write_text(row, col, other, cell.center),
    }
}

/// Render the `Coverage` sheet and feed coverage figures into the records.
/// The `Collectively` row is bold and folds into the reserved `Total` record.
pub(crate) fn render_coverage_sheet(
    worksheet: &mut Worksheet,
    rows: &[StringRecord],
    records: &mut RecordSet,
    header: &mut SummaryHeader,
    styles: &CellStyles,
) -> Result<()> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Ok(());
    };
    header.absorb_coverage(header_row);

    let mut sheet = SheetWriter::new(worksheet);
    for (col, name) in header_row.iter().enumerate() {
        let format = if col == 0 {
            &styles.text_bold
        } else {
            &styles.text_right_bold
        };
        sheet.write_text(0, col as u16, name, format)?;
    }

    for (idx, raw) in data_rows.iter().enumerate() {
        let row = CoverageRow::parse(raw)?;
        let aggregate = row.tag == COLLECTIVE_TAG;
        let cell = styles.row(aggregate);
        let r = (idx + 1) as u32;

        sheet.write_text(r, 0, &row.tag, cell.text)?;
        sheet.write_number(r, 1, row.lines_covered as f64, cell.text)?;
        sheet.write_number(r, 2, row.lines_max as f64, cell.text)?;
        sheet.write_number(r, 3, row.line_coverage, cell.percent)?;
        sheet.write_number(r, 4, row.functions_covered as f64, cell.text)?;
        sheet.write_number(r, 5, row.functions_max as f64, cell.text)?;
        sheet.write_number(r, 6, row.function_coverage, cell.percent)?;

        let record = records.record_for_source_tag(&row.tag, COLLECTIVE_TAG);
        record.lines_covered = Some(row.lines_covered);
        record.lines_max = Some(row.lines_max);
        record.line_coverage = Some(row.line_coverage);
        record.functions_covered = Some(row.functions_covered);
        record.functions_max = Some(row.functions_max);
        record.function_coverage = Some(row.function_coverage);
    }

    sheet.finish(FilterSpan::ExcludeLastRow)
}

/// Render the `Build Overview` sheet, fix the option-column count for the
/// run, and feed ordinal/timestamp/options into the records.
pub(crate) fn render_overview_sheet(
    worksheet: &mut Worksheet,
    rows: &[StringRecord],
    records: &mut RecordSet,
    header: &mut SummaryHeader,
    styles: &CellStyles,
) -> Result<()> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Ok(());
    };
    if header_row.len() < 3 {
        return Err(CovsheetError::validation(
            "Overview header must contain at least the No, Tag and BuildTime columns",
        ));
    }
    let option_count = header_row.len() - 3;
    header.absorb_overview(header_row);
    records.set_option_count(option_count);

    let mut sheet = SheetWriter::new(worksheet);
    for (col, name) in header_row.iter().enumerate() {
        let format = match col {
            0 | 2 => &styles.text_right_bold,
            _ => &styles.text_bold,
        };
        sheet.write_text(0, col as u16, name, format)?;
    }

    let cell = styles.row(false);
    for (idx, raw) in data_rows.iter().enumerate() {
        let row = OverviewRow::parse(raw)?;
        if row.options.len() != option_count {
            return Err(CovsheetError::validation(format!(
                "Overview row for tag '{}' has {} option columns, header declares {}",
                row.tag,
                row.options.len(),
                option_count
            )));
        }
        let r = (idx + 1) as u32;

        sheet.write_number(r, 0, row.sequence as f64, cell.text)?;
        sheet.write_text(r, 1, &row.tag, cell.text)?;
        sheet.write_text(r, 2, &row.build_time, cell.right)?;
        for (opt_idx, value) in row.options.iter().enumerate() {
            write_option_cell(&mut sheet, r, (3 + opt_idx) as u16, value, &cell)?;
        }

        let record = records.record_for(&row.tag);
        record.sequence = Some(row.sequence);
        record.build_time = Some(row.build_time.clone());
        record.options = row.options.clone();
    }

    sheet.finish(FilterSpan::AllRows)
}

/// Render the `Build Accesses` sheet (data rows sorted by access count,
/// descending) and feed access counts into the records. The `Total` row is
/// appended last, bold; its absence is a warning, not an error.
pub(crate) fn render_access_sheet(
    worksheet: &mut Worksheet,
    rows: &[StringRecord],
    records: &mut RecordSet,
    header: &mut SummaryHeader,
    styles: &CellStyles,
) -> Result<()> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Ok(());
    };
    header.absorb_access(header_row);

    let mut sheet = SheetWriter::new(worksheet);
    for (col, name) in header_row.iter().enumerate() {
        let format = if col == 0 {
            &styles.text_bold
        } else {
            &styles.text_right_bold
        };
        sheet.write_text(0, col as u16, name, format)?;
    }

    let mut entries = Vec::new();
    let mut total_row: Option<AccessRow> = None;
    for raw in data_rows {
        let row = AccessRow::parse(raw)?;
        records
            .record_for_source_tag(&row.tag, TOTAL_TAG)
            .accesses = Some(row.accesses);
        if row.tag == TOTAL_TAG {
            total_row = Some(row);
        } else {
            entries.push(row);
        }
    }
    entries.sort_by(|a, b| b.accesses.cmp(&a.accesses));

    let cell = styles.row(false);
    let mut r = 1u32;
    for row in &entries {
        sheet.write_text(r, 0, &row.tag, cell.text)?;
        sheet.write_number(r, 1, row.accesses as f64, cell.text)?;
        r += 1;
    }
    match total_row {
        Some(row) => {
            let bold = styles.row(true);
            sheet.write_text(r, 0, &row.tag, bold.text)?;
            sheet.write_number(r, 1, row.accesses as f64, bold.text)?;
        }
        None => warn!("Build Accesses sheet: missing 'Total' entry"),
    }

    sheet.finish(FilterSpan::AllRows)
}

/// Render the `Summary` sheet from the reconciled records: the dynamic
/// header, one row per build, and the reserved `Total` record last, bold.
pub(crate) fn render_summary_sheet(
    worksheet: &mut Worksheet,
    records: &RecordSet,
    header: &SummaryHeader,
    styles: &CellStyles,
) -> Result<()> {
    let mut sheet = SheetWriter::new(worksheet);
    let option_count = records.option_count();

    for (idx, label) in header.cells().iter().enumerate() {
        let format = if idx == 1 {
            &styles.text_bold
        } else {
            &styles.text_right_bold
        };
        sheet.write_text(0, idx as u16, label, format)?;
    }
    for (idx, name) in header.options().iter().enumerate() {
        sheet.write_text(
            0,
            (SUMMARY_FIXED_COLUMNS + idx) as u16,
            name,
            &styles.text_center_bold,
        )?;
    }

    let (ordered, total) = records.ordered();
    let mut r = 1u32;
    for record in ordered {
        write_summary_row(&mut sheet, r, record, option_count, &styles.row(false))?;
        r += 1;
    }
    if let Some(total_record) = total {
        write_summary_row(&mut sheet, r, total_record, option_count, &styles.row(true))?;
    }

    sheet.finish(FilterSpan::AllRows)
}

fn write_summary_row(
    sheet: &mut SheetWriter<'_>,
    row: u32,
    record: &BuildRecord,
    option_count: usize,
    cell: &RowStyles<'_>,
) -> Result<()> {
    if let Some(sequence) = record.sequence {
        sheet.write_number(row, 0, sequence as f64, cell.text)?;
    }
    sheet.write_text(row, 1, &record.tag, cell.text)?;
    if let Some(build_time) = &record.build_time {
        sheet.write_text(row, 2, build_time, cell.right)?;
    }
    if let Some(value) = record.lines_covered {
        sheet.write_number(row, 3, value as f64, cell.text)?;
    }
    if let Some(value) = record.lines_max {
        sheet.write_number(row, 4, value as f64, cell.text)?;
    }
    if let Some(value) = record.line_coverage {
        sheet.write_number(row, 5, value, cell.percent)?;
    }
    if let Some(value) = record.functions_covered {
        sheet.write_number(row, 6, value as f64, cell.text)?;
    }
    if let Some(value) = record.functions_max {
        sheet.write_number(row, 7, value as f64, cell.text)?;
    }
    if let Some(value) = record.function_coverage {
        sheet.write_number(row, 8, value, cell.percent)?;
    }
    if let Some(value) = record.accesses {
        sheet.write_number(row, 9, value as f64, cell.text)?;
    }
    for idx in 0..option_count {
        write_option_cell(
            sheet,
            row,
            (SUMMARY_FIXED_COLUMNS + idx) as u16,
            record.option_value(idx),
            cell,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn record(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    const COVERAGE_HEADER: [&str; 7] = [
        "Tag",
        "Lines Covered",
        "Lines Max",
        "Lines Coverage",
        "Functions Covered",
        "Functions Max",
        "Function Coverage",
    ];

    #[test]
    fn column_width_has_a_floor_of_five() {
        assert_eq!(column_width(1), 5.0);
        assert_eq!(column_width(4), 5.0);
        assert_eq!(column_width(10), 12.0);
    }

    #[test]
    fn display_len_matches_spreadsheet_reading() {
        assert_eq!(display_len(80.0), 2);
        assert_eq!(display_len(100.0), 3);
        assert_eq!(display_len(0.25), 4);
        assert_eq!(display_len(0.8), 3);
    }

    #[test]
    fn filter_span_excludes_the_last_row_only_when_asked() {
        assert_eq!(filter_last_row(5, FilterSpan::AllRows), 4);
        assert_eq!(filter_last_row(5, FilterSpan::ExcludeLastRow), 3);
        assert_eq!(filter_last_row(1, FilterSpan::AllRows), 0);
        assert_eq!(filter_last_row(1, FilterSpan::ExcludeLastRow), 0);
    }

    #[test]
    fn coverage_sheet_feeds_records_and_routes_the_aggregate() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let mut records = RecordSet::new();
        let mut header = SummaryHeader::new();
        let styles = CellStyles::new();

        let rows = vec![
            record(&COVERAGE_HEADER),
            record(&["buildA", "80", "100", "0.8000", "8", "10", "0.8000"]),
            record(&["Collectively", "160", "200", "0.8000", "16", "20", "0.8000"]),
        ];
        render_coverage_sheet(worksheet, &rows, &mut records, &mut header, &styles).unwrap();

        let build_a = records.get("buildA").unwrap();
        assert_eq!(build_a.lines_covered, Some(80));
        assert_eq!(build_a.line_coverage, Some(0.8));

        let total = records.get(TOTAL_TAG).unwrap();
        assert_eq!(total.lines_covered, Some(160));
        assert_eq!(total.functions_max, Some(20));
        assert!(records.get(COLLECTIVE_TAG).is_none());

        assert_eq!(header.cells()[1], "Tag");
        assert_eq!(header.cells()[3], "Lines Covered");
        assert_eq!(header.cells()[8], "Function Coverage");
    }

    #[test]
    fn overview_sheet_fixes_option_count_and_feeds_records() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let mut records = RecordSet::new();
        let mut header = SummaryHeader::new();
        let styles = CellStyles::new();

        let rows = vec![
            record(&["No", "Tag", "BuildTime", "weak-ssl", "no-tls1_3"]),
            record(&["2", "buildB", "12:01", "FLAG_NOT_SET", "FLAG_SET"]),
            record(&["1", "buildA", "12:00", "FLAG_SET", "FLAG_NOT_SET"]),
        ];
        render_overview_sheet(worksheet, &rows, &mut records, &mut header, &styles).unwrap();

        assert_eq!(records.option_count(), 2);
        let build_a = records.get("buildA").unwrap();
        assert_eq!(build_a.sequence, Some(1));
        assert_eq!(build_a.build_time.as_deref(), Some("12:00"));
        assert_eq!(build_a.options, vec!["FLAG_SET", "FLAG_NOT_SET"]);

        assert_eq!(header.cells()[0], "No");
        assert_eq!(header.options(), ["weak-ssl", "no-tls1_3"]);
    }

    #[test]
    fn overview_sheet_rejects_mismatched_option_columns() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let mut records = RecordSet::new();
        let mut header = SummaryHeader::new();
        let styles = CellStyles::new();

        let rows = vec![
            record(&["No", "Tag", "BuildTime", "opt1"]),
            record(&["1", "buildA", "12:00", "FLAG_SET", "extra"]),
        ];
        let err =
            render_overview_sheet(worksheet, &rows, &mut records, &mut header, &styles)
                .unwrap_err();
        assert!(matches!(err, CovsheetError::Validation { .. }));
    }

    #[test]
    fn access_sheet_routes_total_and_feeds_records() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let mut records = RecordSet::new();
        let mut header = SummaryHeader::new();
        let styles = CellStyles::new();

        let rows = vec![
            record(&["Tag", "Accesses"]),
            record(&["buildA", "3"]),
            record(&["Total", "10"]),
            record(&["buildB", "7"]),
        ];
        render_access_sheet(worksheet, &rows, &mut records, &mut header, &styles).unwrap();

        assert_eq!(records.get("buildA").unwrap().accesses, Some(3));
        assert_eq!(records.get("buildB").unwrap().accesses, Some(7));
        assert_eq!(records.get(TOTAL_TAG).unwrap().accesses, Some(10));
        assert_eq!(header.cells()[9], "Accesses");
    }

    #[test]
    fn access_sheet_without_total_still_renders() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let mut records = RecordSet::new();
        let mut header = SummaryHeader::new();
        let styles = CellStyles::new();

        let rows = vec![record(&["Tag", "Accesses"]), record(&["buildA", "3"])];
        render_access_sheet(worksheet, &rows, &mut records, &mut header, &styles).unwrap();
        assert!(records.get(TOTAL_TAG).is_none());
    }

    #[test]
    fn summary_sheet_renders_reconciled_records() {
        let mut workbook = Workbook::new();
        let mut records = RecordSet::new();
        let mut header = SummaryHeader::new();
        let styles = CellStyles::new();

        {
            let worksheet = workbook.add_worksheet();
            let rows = vec![
                record(&COVERAGE_HEADER),
                record(&["b1", "50", "200", "0.2500", "5", "10", "0.5000"]),
                record(&["Collectively", "50", "200", "0.2500", "5", "10", "0.5000"]),
            ];
            render_coverage_sheet(worksheet, &rows, &mut records, &mut header, &styles).unwrap();
        }
        {
            let worksheet = workbook.add_worksheet();
            let rows = vec![
                record(&["No", "Tag", "BuildTime", "opt"]),
                record(&["1", "b1", "12:00", "FLAG_SET"]),
                record(&["2", "b2", "12:05", "FLAG_NOT_SET"]),
            ];
            render_overview_sheet(worksheet, &rows, &mut records, &mut header, &styles).unwrap();
        }

        let worksheet = workbook.add_worksheet();
        render_summary_sheet(worksheet, &records, &header, &styles).unwrap();

        // One record per tag seen in any source, plus the reserved Total.
        assert_eq!(records.len(), 3);
        let b2 = records.get("b2").unwrap();
        assert_eq!(b2.lines_covered, None);
        assert_eq!(b2.sequence, Some(2));
    }
}

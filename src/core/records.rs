//! Reconciled per-build records.
//!
//! Every input source (coverage overview, build overview, access counts) is
//! keyed by a build *tag*. [`RecordSet`] accumulates one [`BuildRecord`] per
//! tag across all sources: records are created on first reference, fields stay
//! `None` when a tag never appears in the corresponding source, and the
//! source-specific aggregate markers (`Collectively`, `Total`) all fold into
//! the single reserved `Total` record.

use indexmap::IndexMap;

/// Tag of the reserved aggregate record in the summary output.
pub const TOTAL_TAG: &str = "Total";

/// Aggregate marker used by the coverage overview source.
pub const COLLECTIVE_TAG: &str = "Collectively";

/// One reconciled build, denormalized across all input sources.
///
/// Fields are `None` until the owning source contributes a row for this tag;
/// only the rendering layer translates unset fields into empty cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildRecord {
    /// Unique build tag, the join key across all sources.
    pub tag: String,
    /// Build ordinal from the overview source.
    pub sequence: Option<i64>,
    /// Opaque build timestamp display value from the overview source.
    pub build_time: Option<String>,
    /// Covered line count from the coverage source.
    pub lines_covered: Option<u64>,
    /// Instrumented line count from the coverage source.
    pub lines_max: Option<u64>,
    /// Line coverage as a fraction in [0, 1].
    pub line_coverage: Option<f64>,
    /// Covered function count from the coverage source.
    pub functions_covered: Option<u64>,
    /// Instrumented function count from the coverage source.
    pub functions_max: Option<u64>,
    /// Function coverage as a fraction in [0, 1].
    pub function_coverage: Option<f64>,
    /// Build-server access count from the access-log source.
    pub accesses: Option<u64>,
    /// Configuration-option values, positionally aligned with the overview
    /// header's option columns. Empty until the overview source contributes.
    pub options: Vec<String>,
}

impl BuildRecord {
    /// Create an empty record for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Option value at `index`, or the empty string when unset.
    pub fn option_value(&self, index: usize) -> &str {
        self.options.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Tag-keyed collection of [`BuildRecord`]s, preserving insertion order.
#[derive(Debug, Default)]
pub struct RecordSet {
    records: IndexMap<String, BuildRecord>,
    option_count: usize,
}

impl RecordSet {
    /// Create an empty record set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, including the reserved `Total` record if present.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been created yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record without creating it.
    pub fn get(&self, tag: &str) -> Option<&BuildRecord> {
        self.records.get(tag)
    }

    /// Locate or create the record for `tag`.
    pub fn record_for(&mut self, tag: &str) -> &mut BuildRecord {
        self.records
            .entry(tag.to_string())
            .or_insert_with(|| BuildRecord::new(tag))
    }

    /// Locate or create the record for a source row, folding the source's
    /// aggregate marker into the reserved `Total` record.
    pub fn record_for_source_tag(&mut self, tag: &str, aggregate_marker: &str) -> &mut BuildRecord {
        if tag == aggregate_marker {
            self.record_for(TOTAL_TAG)
        } else {
            self.record_for(tag)
        }
    }

    /// Fix the option-column count for this run. Determined once from the
    /// overview header; every rendered record is padded to this length.
    pub fn set_option_count(&mut self, count: usize) {
        self.option_count = count;
    }

    /// Option-column count for this run (0 when no overview was processed).
    pub fn option_count(&self) -> usize {
        self.option_count
    }

    /// Records in summary-row order, with the reserved `Total` record split
    /// off so callers can render it last.
    ///
    /// When every non-aggregate record carries a sequence number the rows are
    /// sorted ascending by it; otherwise insertion order is preserved.
    pub fn ordered(&self) -> (Vec<&BuildRecord>, Option<&BuildRecord>) {
        let mut rows: Vec<&BuildRecord> = self
            .records
            .values()
            .filter(|record| record.tag != TOTAL_TAG)
            .collect();

        if !rows.is_empty() && rows.iter().all(|record| record.sequence.is_some()) {
            rows.sort_by_key(|record| record.sequence);
        }

        (rows, self.records.get(TOTAL_TAG))
    }
}

//! # Covsheet: Build Coverage Collation Toolkit
//!
//! Two small batch pipelines for per-build test artifacts:
//!
//! - **Coverage merger** (`merge-coverage`): discovers one lcov trace file per
//!   build subdirectory, asks the external `lcov` tool for per-trace summaries
//!   and an additive merge of all traces, and writes a coverage overview CSV
//!   with one row per build tag plus a `Collectively` aggregate row.
//! - **Result collector** (`collect-results`): joins up to three CSV inputs
//!   (build overview, access counts, coverage overview) by build tag into one
//!   [`BuildRecord`] per build and renders a four-sheet `results.xlsx`
//!   workbook (`Coverage`, `Build Overview`, `Build Accesses`, `Summary`).
//!
//! Both pipelines are synchronous one-shot runs: flat files in, flat files
//! out, no persistence between runs. Re-running is the recovery mechanism.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! fn main() -> covsheet::Result<()> {
//!     let root = Path::new("./CoverageReport_2022-01-02");
//!     covsheet::merge::merge_coverage(root)?;
//!     covsheet::collect::collect_results(root)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

// Core data model and error handling
pub mod core {
    //! Error types and the reconciled build-record model.

    pub mod errors;
    pub mod records;
}

// Coverage merger pipeline (lcov tool wrapper, trace discovery, overview CSV)
pub mod merge;

// Result collector pipeline (CSV sources, reconciliation, workbook rendering)
pub mod collect;

// Re-export primary types for convenience
pub use crate::core::errors::{CovsheetError, Result};
pub use crate::core::records::{BuildRecord, RecordSet, COLLECTIVE_TAG, TOTAL_TAG};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

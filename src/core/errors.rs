//! Error types for the covsheet library.
//!
//! All fallible library operations return [`Result`], with structured error
//! variants that preserve context from the failing layer (file I/O, CSV
//! decoding, external tool invocation, spreadsheet rendering).

use std::io;

use thiserror::Error;

/// Main result type for covsheet operations.
pub type Result<T> = std::result::Result<T, CovsheetError>;

/// Comprehensive error type for all covsheet operations.
#[derive(Error, Debug)]
pub enum CovsheetError {
    /// I/O related errors (file operations, subprocess spawning)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or column that failed validation
        field: Option<String>,
    },

    /// Parsing errors for tool output
    #[error("Parse error: {message}")]
    Parse {
        /// Error description
        message: String,
    },

    /// External coverage tool errors
    #[error("Coverage tool error: {message}")]
    Tool {
        /// Error description
        message: String,
        /// Error stream output captured from the tool
        stderr: Option<String>,
    },

    /// CSV encoding/decoding errors
    #[error("CSV error: {message}")]
    Csv {
        /// Error description
        message: String,
        /// Underlying CSV error
        #[source]
        source: csv::Error,
    },

    /// Spreadsheet rendering errors
    #[error("Spreadsheet error: {message}")]
    Spreadsheet {
        /// Error description
        message: String,
        /// Underlying workbook error
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

impl CovsheetError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new external tool error carrying the tool's error stream
    pub fn tool_with_stderr(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            stderr: Some(stderr.into()),
        }
    }

    /// Create a new CSV error with context
    pub fn csv(message: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            message: message.into(),
            source,
        }
    }

    /// Create a new spreadsheet error with context
    pub fn spreadsheet(message: impl Into<String>, source: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet {
            message: message.into(),
            source,
        }
    }
}

// Implement From traits for common error types
impl From<csv::Error> for CovsheetError {
    fn from(err: csv::Error) -> Self {
        Self::Csv {
            message: format!("CSV processing failed: {err}"),
            source: err,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for CovsheetError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::Spreadsheet {
            message: format!("Workbook operation failed: {err}"),
            source: err,
        }
    }
}

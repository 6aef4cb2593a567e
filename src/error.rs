//! Error type shared by every stage of the segmentation pipeline

use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Errors raised while loading, segmenting or exporting customer data.
///
/// Every variant is fatal to a run: the pipeline never returns a partial
/// segmentation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input table lacks one or more required columns.
    #[error("input is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    /// A required field is empty on a record.
    #[error("line {line}: required field '{column}' is empty")]
    MissingField { line: usize, column: String },

    /// A field could not be parsed into its expected type.
    ///
    /// `line` is the file line for loaded input, or the 1-based record
    /// position when a transaction slice is validated directly.
    #[error("line {line}: cannot parse '{value}' in column '{column}' as {expected}")]
    Parse {
        line: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// A purchase carries a negative total value.
    #[error("line {line}: total value {value} is negative")]
    NegativeValue { line: usize, value: f64 },

    /// There are no transaction records to segment.
    #[error("no transaction records to segment")]
    EmptyInput,

    /// A fixed reference date falls before a customer's latest purchase.
    #[error("reference date {reference} precedes the last purchase of customer {customer_id} ({last_purchase})")]
    ReferenceDateTooEarly {
        reference: NaiveDateTime,
        customer_id: String,
        last_purchase: NaiveDateTime,
    },

    /// A composite score is not three letters drawn from A-D.
    #[error("invalid RFV score '{0}': expected three letters from A-D")]
    InvalidScore(String),

    /// An action rule was not written as `SCORE=TEXT`.
    #[error("invalid action rule '{0}': expected SCORE=TEXT")]
    InvalidAction(String),

    /// Action text is empty or carries leading or trailing whitespace.
    #[error("invalid action text '{0}': must be non-empty without surrounding whitespace")]
    InvalidActionText(String),

    /// A command-line argument has an unusable value.
    #[error("invalid value '{value}' for {argument}: {reason}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
        reason: &'static str,
    },

    /// File I/O error.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error raised by the tabular (CSV) layer.
    #[error(transparent)]
    Table(#[from] polars::error::PolarsError),

    /// Error raised while writing a spreadsheet.
    #[error(transparent)]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Error raised while reading a spreadsheet.
    #[error(transparent)]
    SpreadsheetRead(#[from] calamine::XlsxError),

    /// Error raised by the JSON layer.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

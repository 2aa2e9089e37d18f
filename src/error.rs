use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of a single dashboard action (filter, report, export).
///
/// None of these invalidate the loaded dataset; the caller reports the
/// message and keeps the session.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("invalid threshold for metric '{metric}': {reason}")]
    InvalidThreshold { metric: String, reason: String },

    #[error("no column for {field}: tried {candidates:?}")]
    MissingColumn {
        field: String,
        candidates: Vec<String>,
    },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("export too large: {rows} rows exceeds the limit of {limit}")]
    ExportTooLarge { rows: usize, limit: usize },

    #[error("malformed report CSV: {0}")]
    MalformedReport(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a data row was skipped by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    MissingAgent,
    MissingDate,
    BadDate(String),
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowIssue::MissingAgent => write!(f, "missing agent identifier"),
            RowIssue::MissingDate => write!(f, "missing date"),
            RowIssue::BadDate(raw) => write!(f, "unparseable date '{raw}'"),
        }
    }
}

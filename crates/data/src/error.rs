use std::path::PathBuf;

use thiserror::Error;
use walkforward_core::{TableError, Timestamp};

/// Errors raised while loading datasets or deriving features and labels from them.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: no 'timestamp' column in header")]
    MissingTimestampColumn { path: PathBuf },

    #[error("{path}, line {line}: unrecognized timestamp '{value}'")]
    InvalidTimestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path}: duplicate timestamp {timestamp}")]
    DuplicateTimestamp { path: PathBuf, timestamp: Timestamp },

    /// A lookback window or horizon of zero bars.
    #[error("Invalid window {name} = 0: must be at least 1")]
    InvalidWindow { name: &'static str },

    #[error(transparent)]
    Table(#[from] TableError),
}

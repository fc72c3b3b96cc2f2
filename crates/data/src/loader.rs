//! CSV loading for price, signal, and on-chain datasets.
//!
//! Every dataset is a CSV with a `timestamp` column plus one numeric column per series.
//! Rows are sorted chronologically on load; duplicate timestamps are rejected.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{Reader, Writer};
use tracing::{debug, info};
use walkforward_core::{DataConfig, TimeSeriesTable, Timestamp};

use crate::error::DataError;
use crate::rolling::pct_change;

const TIMESTAMP_COLUMN: &str = "timestamp";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];

/// Parses the timestamp layouts found in exported datasets. Naive values are taken as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

fn parse_cell(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Reads a timestamp-indexed CSV into a table.
///
/// Empty or non-numeric cells become missing values.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has no `timestamp` column, contains an
/// unparseable or duplicate timestamp.
pub fn read_csv_table(path: &Path) -> Result<TimeSeriesTable, DataError> {
    let csv_err = |source: csv::Error| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = Reader::from_path(path).map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let ts_pos = headers
        .iter()
        .position(|h| h.trim() == TIMESTAMP_COLUMN)
        .ok_or_else(|| DataError::MissingTimestampColumn {
            path: path.to_path_buf(),
        })?;
    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != ts_pos)
        .map(|(_, h)| h.trim().to_string())
        .collect();

    let mut rows: Vec<(Timestamp, Vec<Option<f64>>)> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        let raw_ts = record.get(ts_pos).unwrap_or_default();
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| DataError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: record.position().map_or(0, csv::Position::line),
            value: raw_ts.to_string(),
        })?;
        let values = (0..headers.len())
            .filter(|i| *i != ts_pos)
            .map(|i| record.get(i).and_then(parse_cell))
            .collect();
        rows.push((timestamp, values));
    }

    // Sort by timestamp to ensure chronological order
    rows.sort_by_key(|(ts, _)| *ts);
    if let Some(pair) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(DataError::DuplicateTimestamp {
            path: path.to_path_buf(),
            timestamp: pair[0].0,
        });
    }

    let index: Vec<Timestamp> = rows.iter().map(|(ts, _)| *ts).collect();
    let data = columns
        .iter()
        .enumerate()
        .map(|(c, name)| (name.clone(), rows.iter().map(|(_, v)| v[c]).collect()))
        .collect();

    debug!(path = %path.display(), rows = index.len(), columns = columns.len(), "Loaded CSV");
    Ok(TimeSeriesTable::new(index, data)?)
}

/// Writes a table as CSV: `timestamp` (RFC 3339) followed by one column per series.
/// Missing values are written as empty cells.
///
/// # Errors
///
/// Returns an error if the file cannot be created or writing fails.
pub fn write_csv_table(path: &Path, table: &TimeSeriesTable) -> Result<(), DataError> {
    let csv_err = |source: csv::Error| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = Writer::from_path(path).map_err(csv_err)?;

    let mut header = vec![TIMESTAMP_COLUMN.to_string()];
    header.extend(table.columns().iter().cloned());
    writer.write_record(&header).map_err(csv_err)?;

    for (row, ts) in table.index().iter().enumerate() {
        let mut record = vec![ts.to_rfc3339()];
        record.extend(
            table
                .row(row)
                .into_iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record).map_err(csv_err)?;
    }

    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

/// Loads the configured datasets from one directory.
#[derive(Debug, Clone)]
pub struct DataLoader {
    data_dir: PathBuf,
    prices_file: String,
    signals_file: String,
    onchain_file: Option<String>,
}

impl DataLoader {
    /// Loader over `data_dir` with the default file names.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let defaults = DataConfig::default();
        Self {
            data_dir: data_dir.into(),
            prices_file: defaults.prices_file,
            signals_file: defaults.signals_file,
            onchain_file: defaults.onchain_file,
        }
    }

    #[must_use]
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            prices_file: config.prices_file.clone(),
            signals_file: config.signals_file.clone(),
            onchain_file: config.onchain_file.clone(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Reads `file_name` relative to the data directory.
    ///
    /// # Errors
    ///
    /// See [`read_csv_table`].
    pub fn load_table(&self, file_name: &str) -> Result<TimeSeriesTable, DataError> {
        read_csv_table(&self.data_dir.join(file_name))
    }

    /// Asset close prices, one column per asset.
    ///
    /// # Errors
    ///
    /// See [`read_csv_table`].
    pub fn load_prices(&self) -> Result<TimeSeriesTable, DataError> {
        let table = self.load_table(&self.prices_file)?;
        info!(rows = table.n_rows(), assets = table.n_columns(), "Loaded prices");
        Ok(table)
    }

    /// Baseline trade signals, one column per asset.
    ///
    /// # Errors
    ///
    /// See [`read_csv_table`].
    pub fn load_signals(&self) -> Result<TimeSeriesTable, DataError> {
        let table = self.load_table(&self.signals_file)?;
        info!(rows = table.n_rows(), assets = table.n_columns(), "Loaded signals");
        Ok(table)
    }

    /// On-chain metrics, or `None` when no on-chain file is configured.
    ///
    /// # Errors
    ///
    /// See [`read_csv_table`].
    pub fn load_onchain(&self) -> Result<Option<TimeSeriesTable>, DataError> {
        let Some(file) = &self.onchain_file else {
            return Ok(None);
        };
        let table = self.load_table(file)?;
        info!(rows = table.n_rows(), metrics = table.n_columns(), "Loaded on-chain metrics");
        Ok(Some(table))
    }
}

/// Restricts every table to the range covered by all of them: `[max start, min end]`.
///
/// If any table is empty, or the ranges do not overlap, every result is empty.
#[must_use]
pub fn align_datasets(tables: &[&TimeSeriesTable]) -> Vec<TimeSeriesTable> {
    let start = tables.iter().filter_map(|t| t.index().first().copied()).max();
    let end = tables.iter().filter_map(|t| t.index().last().copied()).min();

    match (start, end) {
        (Some(start), Some(end)) if tables.iter().all(|t| !t.is_empty()) => {
            tables.iter().map(|t| t.between(start, end)).collect()
        }
        _ => tables
            .iter()
            .map(|t| TimeSeriesTable::empty(t.columns()))
            .collect(),
    }
}

/// Simple returns over `periods` rows: `p[t] / p[t - periods] - 1`.
#[must_use]
pub fn compute_returns(prices: &TimeSeriesTable, periods: usize) -> TimeSeriesTable {
    prices.map_columns(|col| pct_change(col, periods))
}

/// Log returns over `periods` rows: `ln(p[t] / p[t - periods])`.
#[must_use]
pub fn compute_log_returns(prices: &TimeSeriesTable, periods: usize) -> TimeSeriesTable {
    prices.map_columns(|col| {
        pct_change(col, periods)
            .into_iter()
            .map(|r| r.map(|r| 1.0 + r).filter(|g| *g > 0.0).map(f64::ln))
            .collect()
    })
}

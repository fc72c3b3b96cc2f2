//! Time-indexed tables shared by every stage of the pipeline.
//!
//! A [`TimeSeriesTable`] is a column-major 2D table whose rows are keyed by a strictly
//! increasing UTC timestamp axis. Cells are `Option<f64>`; `None` is "missing" and
//! propagates through arithmetic the way NaN would, without the silent NaN comparisons.
//!
//! Tables are immutable once built: every transformation returns a new table.

use std::collections::HashSet;
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Row key for all tables.
pub type Timestamp = DateTime<Utc>;

/// Errors raised while building or reshaping tables.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// A column does not have one value per index entry.
    #[error("Column '{column}' has {got} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    /// The index is not strictly increasing.
    #[error("Index is not strictly increasing at row {position}")]
    NonMonotonicIndex { position: usize },

    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A requested column does not exist.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A positional row slice falls outside the table.
    #[error("Row range {start}..{end} out of bounds for {rows} rows")]
    RowRangeOutOfBounds {
        start: usize,
        end: usize,
        rows: usize,
    },

    /// Tables combined column-wise do not share an index.
    #[error("Index mismatch between tables")]
    IndexMismatch,
}

fn check_index(index: &[Timestamp]) -> Result<(), TableError> {
    match index.windows(2).position(|w| w[0] >= w[1]) {
        Some(pos) => Err(TableError::NonMonotonicIndex { position: pos + 1 }),
        None => Ok(()),
    }
}

/// A single named column with its own timestamp index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: String,
    index: Vec<Timestamp>,
    values: Vec<Option<f64>>,
}

impl Series {
    /// Creates a series, validating length and index ordering.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` and `index` differ in length or the index is not
    /// strictly increasing.
    pub fn new(
        name: impl Into<String>,
        index: Vec<Timestamp>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        if index.len() != values.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: index.len(),
                got: values.len(),
            });
        }
        check_index(&index)?;
        Ok(Self {
            name,
            index,
            values,
        })
    }

    /// Creates a series with no rows.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: Vec::new(),
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Value at `timestamp`, if the timestamp exists and the cell is present.
    #[must_use]
    pub fn get(&self, timestamp: Timestamp) -> Option<f64> {
        self.index
            .binary_search(&timestamp)
            .ok()
            .and_then(|pos| self.values[pos])
    }

    /// Iterates `(timestamp, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, Option<f64>)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }

    /// Values with missing cells dropped.
    #[must_use]
    pub fn present_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| *v).collect()
    }
}

/// Column-name alignment between two tables.
///
/// Operations that pair columns by name only process `common`; the other two sets are
/// what was dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAlignment {
    /// Columns present in both tables, in left-table order.
    pub common: Vec<String>,
    /// Columns only in the left table.
    pub left_only: Vec<String>,
    /// Columns only in the right table.
    pub right_only: Vec<String>,
}

impl ColumnAlignment {
    /// Computes the alignment of `left` against `right`.
    #[must_use]
    pub fn between(left: &[String], right: &[String]) -> Self {
        let right_set: HashSet<&str> = right.iter().map(String::as_str).collect();
        let left_set: HashSet<&str> = left.iter().map(String::as_str).collect();

        let (common, left_only): (Vec<String>, Vec<String>) = left
            .iter()
            .cloned()
            .partition(|c| right_set.contains(c.as_str()));
        let right_only = right
            .iter()
            .filter(|c| !left_set.contains(c.as_str()))
            .cloned()
            .collect();

        Self {
            common,
            left_only,
            right_only,
        }
    }

    /// True when no column was dropped from either side.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.left_only.is_empty() && self.right_only.is_empty()
    }

    /// All dropped column names, left side first.
    #[must_use]
    pub fn dropped(&self) -> Vec<String> {
        self.left_only
            .iter()
            .chain(self.right_only.iter())
            .cloned()
            .collect()
    }
}

/// A 2D table of optional reals keyed by timestamp rows and named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesTable {
    index: Vec<Timestamp>,
    columns: Vec<String>,
    /// Column-major storage: `data[column][row]`.
    data: Vec<Vec<Option<f64>>>,
}

impl TimeSeriesTable {
    /// Builds a table from named columns sharing `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is not strictly increasing, a column has the wrong
    /// length, or a column name repeats.
    pub fn new(
        index: Vec<Timestamp>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self, TableError> {
        check_index(&index)?;

        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != index.len() {
                return Err(TableError::LengthMismatch {
                    column: name,
                    expected: index.len(),
                    got: values.len(),
                });
            }
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumn(name));
            }
            names.push(name);
            data.push(values);
        }

        Ok(Self {
            index,
            columns: names,
            data,
        })
    }

    /// Builds a table of fully-present values, one row vector per timestamp.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TimeSeriesTable::new`].
    pub fn from_rows(
        index: Vec<Timestamp>,
        columns: &[&str],
        rows: &[Vec<f64>],
    ) -> Result<Self, TableError> {
        let named = columns
            .iter()
            .enumerate()
            .map(|(c, name)| {
                let values = rows.iter().map(|row| row.get(c).copied()).collect();
                ((*name).to_string(), values)
            })
            .collect();
        Self::new(index, named)
    }

    /// A table with the given columns and no rows.
    #[must_use]
    pub fn empty(columns: &[String]) -> Self {
        Self {
            index: Vec::new(),
            columns: columns.to_vec(),
            data: vec![Vec::new(); columns.len()],
        }
    }

    /// Replicates `series` into every column in `columns`.
    #[must_use]
    pub fn broadcast(series: &Series, columns: &[String]) -> Self {
        Self {
            index: series.index().to_vec(),
            columns: columns.to_vec(),
            data: vec![series.values().to_vec(); columns.len()],
        }
    }

    #[must_use]
    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Position of a column by name.
    #[must_use]
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of a named column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.column_position(name).map(|c| self.data[c].as_slice())
    }

    /// Values of the column at position `col`.
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of bounds.
    #[must_use]
    pub fn column_at(&self, col: usize) -> &[Option<f64>] {
        &self.data[col]
    }

    /// Cell at (`row`, `col`) by position; `None` when missing or out of bounds.
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get(col).and_then(|c| c.get(row).copied().flatten())
    }

    /// All cells of one row, in column order.
    #[must_use]
    pub fn row(&self, row: usize) -> Vec<Option<f64>> {
        self.data.iter().map(|c| c.get(row).copied().flatten()).collect()
    }

    /// Extracts a column as a [`Series`].
    #[must_use]
    pub fn to_series(&self, name: &str) -> Option<Series> {
        self.column(name).map(|values| Series {
            name: name.to_string(),
            index: self.index.clone(),
            values: values.to_vec(),
        })
    }

    /// Positional row slice `[range.start, range.end)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the table or is reversed.
    pub fn slice_rows(&self, range: Range<usize>) -> Result<Self, TableError> {
        if range.start > range.end || range.end > self.n_rows() {
            return Err(TableError::RowRangeOutOfBounds {
                start: range.start,
                end: range.end,
                rows: self.n_rows(),
            });
        }
        Ok(Self {
            index: self.index[range.clone()].to_vec(),
            columns: self.columns.clone(),
            data: self.data.iter().map(|c| c[range.clone()].to_vec()).collect(),
        })
    }

    /// Rows at the given timestamps; timestamps absent from this table yield missing cells.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is not strictly increasing.
    pub fn reindex(&self, index: &[Timestamp]) -> Result<Self, TableError> {
        check_index(index)?;
        let positions: Vec<Option<usize>> = index
            .iter()
            .map(|ts| self.index.binary_search(ts).ok())
            .collect();
        let data = self
            .data
            .iter()
            .map(|c| positions.iter().map(|p| p.and_then(|r| c[r])).collect())
            .collect();
        Ok(Self {
            index: index.to_vec(),
            columns: self.columns.clone(),
            data,
        })
    }

    /// Rows whose timestamp lies in `[start, end]`.
    #[must_use]
    pub fn between(&self, start: Timestamp, end: Timestamp) -> Self {
        let lo = self.index.partition_point(|ts| *ts < start);
        let hi = self.index.partition_point(|ts| *ts <= end).max(lo);
        Self {
            index: self.index[lo..hi].to_vec(),
            columns: self.columns.clone(),
            data: self.data.iter().map(|c| c[lo..hi].to_vec()).collect(),
        }
    }

    /// Subset of columns, in the requested order.
    ///
    /// # Errors
    ///
    /// Returns an error if any requested column does not exist.
    pub fn select_columns(&self, names: &[String]) -> Result<Self, TableError> {
        let mut data = Vec::with_capacity(names.len());
        for name in names {
            let pos = self
                .column_position(name)
                .ok_or_else(|| TableError::UnknownColumn(name.clone()))?;
            data.push(self.data[pos].clone());
        }
        Ok(Self {
            index: self.index.clone(),
            columns: names.to_vec(),
            data,
        })
    }

    /// Name alignment of this table's columns against `other`'s.
    #[must_use]
    pub fn align_columns(&self, other: &Self) -> ColumnAlignment {
        ColumnAlignment::between(&self.columns, &other.columns)
    }

    /// Applies `f` to every cell, producing a new table of the same shape.
    #[must_use]
    pub fn map_values<F>(&self, f: F) -> Self
    where
        F: Fn(Option<f64>) -> Option<f64>,
    {
        Self {
            index: self.index.clone(),
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|c| c.iter().map(|v| f(*v)).collect())
                .collect(),
        }
    }

    /// Applies `f` to each whole column, producing a new table with the same index.
    ///
    /// `f` receives the column values and must return one value per row.
    #[must_use]
    pub fn map_columns<F>(&self, f: F) -> Self
    where
        F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        Self {
            index: self.index.clone(),
            columns: self.columns.clone(),
            data: self.data.iter().map(|c| f(c)).collect(),
        }
    }

    /// Prefixes every column name.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        for name in &mut self.columns {
            *name = format!("{prefix}{name}");
        }
        self
    }

    /// Concatenates tables column-wise. All tables must share the same index.
    ///
    /// # Errors
    ///
    /// Returns an error if indices differ or column names collide.
    pub fn concat_columns(tables: &[Self]) -> Result<Self, TableError> {
        let Some(first) = tables.first() else {
            return Ok(Self::empty(&[]));
        };
        let mut columns = Vec::new();
        for table in tables {
            if table.index != first.index {
                return Err(TableError::IndexMismatch);
            }
            columns.extend(table.columns.iter().cloned().zip(table.data.iter().cloned()));
        }
        Self::new(first.index.clone(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(hours: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours * 3)
    }

    fn sample() -> TimeSeriesTable {
        TimeSeriesTable::from_rows(
            vec![ts(0), ts(1), ts(2)],
            &["BTC", "ETH"],
            &[vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
        )
        .unwrap()
    }

    // ============================================================
    // Construction
    // ============================================================

    #[test]
    fn new_rejects_non_increasing_index() {
        let result = TimeSeriesTable::new(
            vec![ts(0), ts(2), ts(1)],
            vec![("A".to_string(), vec![Some(1.0); 3])],
        );
        assert_eq!(result, Err(TableError::NonMonotonicIndex { position: 2 }));
    }

    #[test]
    fn new_rejects_duplicate_timestamps() {
        let result = TimeSeriesTable::new(
            vec![ts(0), ts(0)],
            vec![("A".to_string(), vec![Some(1.0); 2])],
        );
        assert!(matches!(result, Err(TableError::NonMonotonicIndex { .. })));
    }

    #[test]
    fn new_rejects_short_column() {
        let result = TimeSeriesTable::new(
            vec![ts(0), ts(1)],
            vec![("A".to_string(), vec![Some(1.0)])],
        );
        assert!(matches!(result, Err(TableError::LengthMismatch { .. })));
    }

    #[test]
    fn new_rejects_duplicate_columns() {
        let result = TimeSeriesTable::new(
            vec![ts(0)],
            vec![
                ("A".to_string(), vec![Some(1.0)]),
                ("A".to_string(), vec![Some(2.0)]),
            ],
        );
        assert_eq!(result, Err(TableError::DuplicateColumn("A".to_string())));
    }

    #[test]
    fn series_rejects_length_mismatch() {
        assert!(Series::new("p", vec![ts(0)], vec![]).is_err());
    }

    // ============================================================
    // Access and reshaping
    // ============================================================

    #[test]
    fn slice_rows_is_half_open() {
        let sliced = sample().slice_rows(1..3).unwrap();
        assert_eq!(sliced.index(), &[ts(1), ts(2)]);
        assert_eq!(sliced.column("ETH").unwrap(), &[Some(20.0), Some(30.0)]);
    }

    #[test]
    fn slice_rows_out_of_bounds_errors() {
        assert!(sample().slice_rows(2..4).is_err());
    }

    #[test]
    fn reindex_fills_missing_for_unknown_timestamps() {
        let table = sample().reindex(&[ts(1), ts(5)]).unwrap();
        assert_eq!(table.column("BTC").unwrap(), &[Some(2.0), None]);
    }

    #[test]
    fn between_is_inclusive_on_both_ends() {
        let table = sample().between(ts(1), ts(2));
        assert_eq!(table.n_rows(), 2);
    }

    #[test]
    fn select_columns_unknown_errors() {
        let result = sample().select_columns(&["SOL".to_string()]);
        assert_eq!(result, Err(TableError::UnknownColumn("SOL".to_string())));
    }

    #[test]
    fn broadcast_replicates_series_into_each_column() {
        let series = Series::new("p", vec![ts(0), ts(1)], vec![Some(0.7), None]).unwrap();
        let table = TimeSeriesTable::broadcast(&series, &["A".to_string(), "B".to_string()]);
        assert_eq!(table.column("A").unwrap(), table.column("B").unwrap());
        assert_eq!(table.value(0, 1), Some(0.7));
        assert_eq!(table.value(1, 1), None);
    }

    #[test]
    fn map_values_does_not_touch_source() {
        let source = sample();
        let doubled = source.map_values(|v| v.map(|x| x * 2.0));
        assert_eq!(source.value(0, 0), Some(1.0));
        assert_eq!(doubled.value(0, 0), Some(2.0));
    }

    #[test]
    fn concat_columns_requires_same_index() {
        let a = sample();
        let b = sample().slice_rows(0..2).unwrap().with_prefix("x_");
        assert_eq!(
            TimeSeriesTable::concat_columns(&[a, b]),
            Err(TableError::IndexMismatch)
        );
    }

    #[test]
    fn series_get_uses_timestamp_lookup() {
        let series = sample().to_series("ETH").unwrap();
        assert_eq!(series.get(ts(2)), Some(30.0));
        assert_eq!(series.get(ts(9)), None);
    }

    // ============================================================
    // Column alignment
    // ============================================================

    #[test]
    fn alignment_reports_both_sides() {
        let left = vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()];
        let right = vec!["ETH".to_string(), "BTC".to_string(), "DOGE".to_string()];
        let alignment = ColumnAlignment::between(&left, &right);

        assert_eq!(alignment.common, vec!["BTC", "ETH"]);
        assert_eq!(alignment.left_only, vec!["SOL"]);
        assert_eq!(alignment.right_only, vec!["DOGE"]);
        assert!(!alignment.is_complete());
        assert_eq!(alignment.dropped(), vec!["SOL", "DOGE"]);
    }

    #[test]
    fn alignment_complete_when_columns_match() {
        let cols = vec!["A".to_string()];
        assert!(ColumnAlignment::between(&cols, &cols).is_complete());
    }
}

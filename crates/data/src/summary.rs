use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use walkforward_core::{TimeSeriesTable, Timestamp};

/// Shape, date range and missing-value share of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub name: String,
    pub rows: usize,
    pub columns: Vec<String>,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    /// Percentage of missing cells per column, 0 to 100.
    pub missing_pct: BTreeMap<String, f64>,
}

impl DataSummary {
    #[must_use]
    pub fn from_table(name: &str, table: &TimeSeriesTable) -> Self {
        let rows = table.n_rows();
        let missing_pct = table
            .columns()
            .iter()
            .enumerate()
            .map(|(c, col)| {
                let missing = table.column_at(c).iter().filter(|v| v.is_none()).count();
                let pct = if rows == 0 {
                    0.0
                } else {
                    missing as f64 / rows as f64 * 100.0
                };
                (col.clone(), pct)
            })
            .collect();

        Self {
            name: name.to_string(),
            rows,
            columns: table.columns().to_vec(),
            start: table.index().first().copied(),
            end: table.index().last().copied(),
            missing_pct,
        }
    }
}

impl fmt::Display for DataSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  Rows:       {}", self.rows)?;
        writeln!(f, "  Columns:    {}", self.columns.len())?;
        match (self.start, self.end) {
            (Some(start), Some(end)) => writeln!(
                f,
                "  Range:      {} .. {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            )?,
            _ => writeln!(f, "  Range:      (empty)")?,
        }
        for (col, pct) in &self.missing_pct {
            if *pct > 0.0 {
                writeln!(f, "  Missing:    {col} {pct:.1}%")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn summary_reports_range_and_missing_share() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        let table = TimeSeriesTable::new(
            vec![t0, t1],
            vec![
                ("BTC".to_string(), vec![Some(1.0), None]),
                ("ETH".to_string(), vec![Some(1.0), Some(2.0)]),
            ],
        )
        .unwrap();

        let summary = DataSummary::from_table("prices", &table);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.start, Some(t0));
        assert_eq!(summary.end, Some(t1));
        assert_eq!(summary.missing_pct["BTC"], 50.0);
        assert_eq!(summary.missing_pct["ETH"], 0.0);

        let text = summary.to_string();
        assert!(text.contains("BTC 50.0%"));
        assert!(!text.contains("ETH"));
    }

    #[test]
    fn empty_table_has_no_range() {
        let summary = DataSummary::from_table("empty", &TimeSeriesTable::empty(&["x".to_string()]));
        assert_eq!(summary.start, None);
        assert_eq!(summary.missing_pct["x"], 0.0);
        assert!(summary.to_string().contains("(empty)"));
    }
}

//! Probability filter over baseline signals.
//!
//! `filtered[t, a] = baseline[t, a] * 1[probability[t, a] > threshold]`

use walkforward_core::config::validate_threshold;
use walkforward_core::{TimeSeriesTable, Timestamp};

use crate::error::BacktestError;

/// Gates `baseline` signals by `probabilities` with a strict `>` comparison.
///
/// The output has the baseline's index and columns. A cell is missing when the baseline
/// cell is missing or when the matching probability cell is missing or absent (timestamp or
/// column not present in `probabilities`).
///
/// # Errors
///
/// Returns a configuration error if `threshold` is outside [0, 1].
pub fn apply_filter(
    baseline: &TimeSeriesTable,
    probabilities: &TimeSeriesTable,
    threshold: f64,
) -> Result<TimeSeriesTable, BacktestError> {
    validate_threshold(threshold)?;

    let prob_rows: Vec<Option<usize>> = baseline
        .index()
        .iter()
        .map(|ts: &Timestamp| probabilities.index().binary_search(ts).ok())
        .collect();

    let columns = baseline
        .columns()
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let signal = baseline.column_at(c);
            let prob = probabilities.column(name);
            let values = signal
                .iter()
                .zip(&prob_rows)
                .map(|(s, row)| {
                    let p = prob.zip(*row).and_then(|(col, r)| col[r]);
                    match (s, p) {
                        (Some(s), Some(p)) => Some(if p > threshold { *s } else { 0.0 }),
                        _ => None,
                    }
                })
                .collect();
            (name.clone(), values)
        })
        .collect();

    Ok(TimeSeriesTable::new(baseline.index().to_vec(), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn ts(i: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(3 * i)
    }

    fn table(cols: &[&str], rows: &[Vec<f64>]) -> TimeSeriesTable {
        let index = (0..rows.len() as i64).map(ts).collect();
        TimeSeriesTable::from_rows(index, cols, rows).unwrap()
    }

    #[test]
    fn keeps_signal_only_above_threshold() {
        let baseline = table(&["BTC"], &[vec![1.0], vec![1.0], vec![0.0]]);
        let probs = table(&["BTC"], &[vec![0.8], vec![0.2], vec![0.9]]);

        let filtered = apply_filter(&baseline, &probs, 0.5).unwrap();
        assert_eq!(
            filtered.column("BTC").unwrap(),
            &[Some(1.0), Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn probability_equal_to_threshold_is_filtered_out() {
        let baseline = table(&["BTC", "ETH"], &[vec![1.0, 1.0]]);
        let probs = table(&["BTC", "ETH"], &[vec![0.5, 0.5]]);

        let filtered = apply_filter(&baseline, &probs, 0.5).unwrap();
        assert_eq!(filtered.row(0), vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn missing_probability_column_yields_missing() {
        let baseline = table(&["BTC", "SOL"], &[vec![1.0, 1.0]]);
        let probs = table(&["BTC"], &[vec![0.9]]);

        let filtered = apply_filter(&baseline, &probs, 0.5).unwrap();
        assert_eq!(filtered.row(0), vec![Some(1.0), None]);
    }

    #[test]
    fn missing_probability_row_yields_missing() {
        let baseline = table(&["BTC"], &[vec![1.0], vec![1.0]]);
        let probs = table(&["BTC"], &[vec![0.9]]);

        let filtered = apply_filter(&baseline, &probs, 0.5).unwrap();
        assert_eq!(filtered.column("BTC").unwrap(), &[Some(1.0), None]);
    }

    #[test]
    fn missing_baseline_propagates() {
        let baseline = TimeSeriesTable::new(vec![ts(0)], vec![("BTC".to_string(), vec![None])])
            .unwrap();
        let probs = table(&["BTC"], &[vec![0.9]]);

        let filtered = apply_filter(&baseline, &probs, 0.5).unwrap();
        assert_eq!(filtered.value(0, 0), None);
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let baseline = table(&["BTC"], &[vec![1.0]]);
        let probs = table(&["BTC"], &[vec![0.9]]);

        let err = apply_filter(&baseline, &probs, -0.1).unwrap_err();
        assert!(matches!(err, BacktestError::Config(_)));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let baseline = table(&["BTC"], &[vec![1.0]]);
        let probs = table(&["BTC"], &[vec![0.1]]);
        let before = baseline.clone();

        let _ = apply_filter(&baseline, &probs, 0.5).unwrap();
        assert_eq!(baseline, before);
    }
}

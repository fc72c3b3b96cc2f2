//! Supervised labels for the probability model.
//!
//! A label at `t` looks `horizon` bars ahead, so it is only known once `t + horizon` has
//! passed. Labels exist only where the baseline signal is long (exactly 1); everywhere else,
//! and wherever the forward return is unavailable, the label is missing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use walkforward_core::{LabelConfig, Series, TimeSeriesTable};

use crate::error::DataError;
use crate::rolling::{forward_pct_change, pct_change, rolling_std};

/// Name of the pooled single-column label.
pub const LABEL_COLUMN: &str = "label";

/// Labels `score > threshold` for every cell where the signal is long.
///
/// `scores` is computed on the price table's own rows and aligned to the signal index here.
fn label_where_long(
    signals: &TimeSeriesTable,
    scores: &TimeSeriesTable,
    threshold: f64,
) -> Result<TimeSeriesTable, DataError> {
    let alignment = signals.align_columns(scores);
    let scores = scores
        .select_columns(&alignment.common)?
        .reindex(signals.index())?;

    let columns = alignment
        .common
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let signal = signals.column(name).unwrap_or_default();
            let values = signal
                .iter()
                .zip(scores.column_at(c))
                .map(|(s, r)| match (s, r) {
                    (Some(s), Some(r)) if *s == 1.0 => Some(if *r > threshold { 1.0 } else { 0.0 }),
                    _ => None,
                })
                .collect();
            (name.clone(), values)
        })
        .collect();
    Ok(TimeSeriesTable::new(signals.index().to_vec(), columns)?)
}

fn check_horizon(horizon: usize) -> Result<(), DataError> {
    if horizon == 0 {
        return Err(DataError::InvalidWindow { name: "horizon" });
    }
    Ok(())
}

/// 1 if the `horizon`-bar forward return exceeds `threshold`, else 0; only where the
/// signal is 1. Columns are the assets present in both tables, in signal order.
///
/// # Errors
///
/// Returns an error if `horizon` is zero.
pub fn forward_return_labels(
    prices: &TimeSeriesTable,
    signals: &TimeSeriesTable,
    horizon: usize,
    threshold: f64,
) -> Result<TimeSeriesTable, DataError> {
    check_horizon(horizon)?;
    let fwd = prices.map_columns(|col| forward_pct_change(col, horizon));
    label_where_long(signals, &fwd, threshold)
}

/// Forward-return labels that must clear the round-trip cost `entry_cost + exit_cost`.
///
/// # Errors
///
/// Returns an error if `horizon` is zero.
pub fn cost_adjusted_labels(
    prices: &TimeSeriesTable,
    signals: &TimeSeriesTable,
    horizon: usize,
    entry_cost: f64,
    exit_cost: f64,
) -> Result<TimeSeriesTable, DataError> {
    forward_return_labels(prices, signals, horizon, entry_cost + exit_cost)
}

/// 1 if the forward return divided by trailing volatility exceeds `threshold`.
///
/// Volatility is the sample std of one-bar returns over the `vol_window` bars ending at `t`.
///
/// # Errors
///
/// Returns an error if `horizon` or `vol_window` is zero.
pub fn risk_adjusted_labels(
    prices: &TimeSeriesTable,
    signals: &TimeSeriesTable,
    horizon: usize,
    threshold: f64,
    vol_window: usize,
) -> Result<TimeSeriesTable, DataError> {
    check_horizon(horizon)?;
    if vol_window == 0 {
        return Err(DataError::InvalidWindow { name: "vol_window" });
    }
    let scores = prices.map_columns(|col| {
        let fwd = forward_pct_change(col, horizon);
        let vol = rolling_std(&pct_change(col, 1), vol_window);
        fwd.into_iter()
            .zip(vol)
            .map(|(r, v)| {
                let (r, v) = (r?, v?);
                (v != 0.0).then(|| r / v)
            })
            .collect()
    });
    label_where_long(signals, &scores, threshold)
}

/// Cost-adjusted labels using the configured horizon and costs.
///
/// # Errors
///
/// Returns an error if the configured horizon is zero.
pub fn labels_from_config(
    prices: &TimeSeriesTable,
    signals: &TimeSeriesTable,
    config: &LabelConfig,
) -> Result<TimeSeriesTable, DataError> {
    cost_adjusted_labels(
        prices,
        signals,
        config.horizon,
        config.entry_cost,
        config.exit_cost,
    )
}

/// Collapses per-asset labels into one column for a model shared across assets.
///
/// 1 if any present label is 1, 0 if all present labels are 0, missing if none is present.
///
/// # Errors
///
/// Returns an error if the label index cannot back a series.
pub fn pooled_label(labels: &TimeSeriesTable) -> Result<Series, DataError> {
    let values = (0..labels.n_rows())
        .map(|row| {
            let present: Vec<f64> = labels.row(row).into_iter().flatten().collect();
            if present.is_empty() {
                None
            } else if present.iter().any(|v| *v == 1.0) {
                Some(1.0)
            } else {
                Some(0.0)
            }
        })
        .collect();
    Ok(Series::new(LABEL_COLUMN, labels.index().to_vec(), values)?)
}

/// Class counts for one set of labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStats {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    /// `positive / total`, 0 when empty.
    pub positive_rate: f64,
    /// `negative / max(positive, 1)`.
    pub imbalance_ratio: f64,
}

impl LabelStats {
    fn from_values<'a>(values: impl IntoIterator<Item = &'a Option<f64>>) -> Self {
        let mut stats = Self::default();
        for v in values.into_iter().flatten() {
            stats.total += 1;
            if *v == 1.0 {
                stats.positive += 1;
            } else if *v == 0.0 {
                stats.negative += 1;
            }
        }
        if stats.total > 0 {
            stats.positive_rate = stats.positive as f64 / stats.total as f64;
        }
        stats.imbalance_ratio = stats.negative as f64 / stats.positive.max(1) as f64;
        stats
    }
}

/// Label balance overall and per asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub overall: LabelStats,
    pub per_asset: BTreeMap<String, LabelStats>,
}

impl LabelDistribution {
    #[must_use]
    pub fn analyze(labels: &TimeSeriesTable) -> Self {
        let overall =
            LabelStats::from_values((0..labels.n_columns()).flat_map(|c| labels.column_at(c)));
        let per_asset = labels
            .columns()
            .iter()
            .enumerate()
            .map(|(c, name)| (name.clone(), LabelStats::from_values(labels.column_at(c))))
            .collect();
        Self { overall, per_asset }
    }
}

//! Signal-to-return calculation for long/cash strategies.
//!
//! A signal at `t` is known at the start of `[t, t+1)` and earns the forward return
//! `price(t+1) / price(t) - 1`, which is attributed to `t`. The last timestamp of a price
//! series has no forward return.

use serde::{Deserialize, Serialize};
use tracing::warn;
use walkforward_core::config::validate_transaction_cost;
use walkforward_core::{ColumnAlignment, Series, TimeSeriesTable};

use crate::error::BacktestError;

/// Name of the aggregated portfolio return series.
pub const PORTFOLIO_COLUMN: &str = "portfolio";

/// Per-asset strategy returns plus the column alignment that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReturns {
    /// Signal × forward return, before costs.
    pub gross: TimeSeriesTable,
    /// Gross minus transaction costs.
    pub net: TimeSeriesTable,
    /// Columns kept and dropped when pairing signals with prices.
    pub alignment: ColumnAlignment,
}

/// Forward simple returns per column, attributed to the decision timestamp.
#[must_use]
pub fn forward_returns(prices: &TimeSeriesTable) -> TimeSeriesTable {
    prices.map_columns(|col| {
        (0..col.len())
            .map(|t| match (col[t], col.get(t + 1).copied().flatten()) {
                (Some(now), Some(next)) if now != 0.0 => Some(next / now - 1.0),
                _ => None,
            })
            .collect()
    })
}

/// Computes cost-adjusted returns of `signals` applied to `prices`.
///
/// Only columns present in both tables are processed; the rest are reported in
/// [`StrategyReturns::alignment`] and logged. Forward returns are taken over the price
/// table's own rows and then aligned to the signal index, so a signal timestamp with no
/// price row gets a missing return.
///
/// Cost at `t` is `|signal(t) - signal(t-1)| * transaction_cost`; the first row has no
/// prior signal and is charged nothing.
///
/// # Errors
///
/// Returns a configuration error for a negative or non-finite `transaction_cost`.
pub fn compute_strategy_returns(
    signals: &TimeSeriesTable,
    prices: &TimeSeriesTable,
    transaction_cost: f64,
) -> Result<StrategyReturns, BacktestError> {
    validate_transaction_cost(transaction_cost)?;

    let alignment = signals.align_columns(prices);
    if !alignment.is_complete() {
        warn!(
            dropped = ?alignment.dropped(),
            "Signal and price columns differ, computing returns on the intersection only"
        );
    }

    let signals = signals.select_columns(&alignment.common)?;
    let fwd = forward_returns(&prices.select_columns(&alignment.common)?).reindex(signals.index())?;

    let mut gross_cols = Vec::with_capacity(alignment.common.len());
    let mut net_cols = Vec::with_capacity(alignment.common.len());
    for (c, name) in alignment.common.iter().enumerate() {
        let sig = signals.column_at(c);
        let ret = fwd.column_at(c);

        let gross: Vec<Option<f64>> = sig
            .iter()
            .zip(ret)
            .map(|(s, r)| Some((*s)? * (*r)?))
            .collect();
        let net = gross
            .iter()
            .enumerate()
            .map(|(t, g)| {
                let cost = if t == 0 {
                    0.0
                } else {
                    (sig[t]? - sig[t - 1]?).abs() * transaction_cost
                };
                Some((*g)? - cost)
            })
            .collect();

        gross_cols.push((name.clone(), gross));
        net_cols.push((name.clone(), net));
    }

    let index = signals.index().to_vec();
    Ok(StrategyReturns {
        gross: TimeSeriesTable::new(index.clone(), gross_cols)?,
        net: TimeSeriesTable::new(index, net_cols)?,
        alignment,
    })
}

/// Aggregates per-asset returns into one portfolio series.
///
/// Without `weights`, each timestamp weights its non-missing assets equally. With
/// `weights`, cells are matched by timestamp and column name and summed as
/// `weight * return` wherever both are present. A timestamp with nothing to sum returns
/// 0.0, not missing.
#[must_use]
pub fn compute_portfolio_returns(
    asset_returns: &TimeSeriesTable,
    weights: Option<&TimeSeriesTable>,
) -> Series {
    let index = asset_returns.index().to_vec();
    let values = match weights {
        None => (0..asset_returns.n_rows())
            .map(|t| {
                let present: Vec<f64> = asset_returns.row(t).into_iter().flatten().collect();
                if present.is_empty() {
                    Some(0.0)
                } else {
                    Some(present.iter().sum::<f64>() / present.len() as f64)
                }
            })
            .collect(),
        Some(weights) => {
            let rows: Vec<Option<usize>> = index
                .iter()
                .map(|ts| weights.index().binary_search(ts).ok())
                .collect();
            let weight_cols: Vec<Option<usize>> = asset_returns
                .columns()
                .iter()
                .map(|name| weights.column_position(name))
                .collect();
            (0..asset_returns.n_rows())
                .map(|t| {
                    let total = weight_cols
                        .iter()
                        .enumerate()
                        .filter_map(|(c, wc)| {
                            let w = weights.value(rows[t]?, (*wc)?)?;
                            Some(w * asset_returns.value(t, c)?)
                        })
                        .sum::<f64>();
                    Some(total)
                })
                .collect()
        }
    };

    Series::new(PORTFOLIO_COLUMN, index, values)
        .unwrap_or_else(|_| Series::empty(PORTFOLIO_COLUMN))
}

/// Compounds `returns` from `initial_capital`. Missing returns count as 0.
#[must_use]
pub fn compute_equity_curve(returns: &Series, initial_capital: f64) -> Series {
    let values = returns
        .values()
        .iter()
        .scan(initial_capital, |equity, r| {
            *equity *= 1.0 + r.unwrap_or(0.0);
            Some(Some(*equity))
        })
        .collect();

    Series::new("equity", returns.index().to_vec(), values)
        .unwrap_or_else(|_| Series::empty("equity"))
}

/// Relative decline from the running peak; every value is `<= 0`.
///
/// Missing equity values stay missing and do not move the peak. A non-positive peak has
/// no defined drawdown and yields missing.
#[must_use]
pub fn compute_drawdown_series(equity: &Series) -> Series {
    let mut peak = f64::NEG_INFINITY;
    let values = equity
        .values()
        .iter()
        .map(|e| {
            let e = (*e)?;
            peak = peak.max(e);
            if peak > 0.0 {
                Some((e - peak) / peak)
            } else {
                None
            }
        })
        .collect();

    Series::new("drawdown", equity.index().to_vec(), values)
        .unwrap_or_else(|_| Series::empty("drawdown"))
}

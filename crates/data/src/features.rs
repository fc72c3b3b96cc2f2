//! Feature engineering over price, signal, and on-chain tables.
//!
//! Every feature at row `t` uses only rows `<= t`. Windows are counted in bars; with 3-hour
//! bars 8 is a day, 56 a week and 224 roughly a month.
//!
//! Column names follow `{asset}_{feature}_{window}p`, ordered window-major.

use tracing::{debug, warn};
use walkforward_core::{FeatureConfig, TimeSeriesTable, Timestamp};

use crate::error::DataError;
use crate::rolling::{diff, forward_fill, pct_change, rolling_mean, rolling_std};

fn per_window<F>(
    prices: &TimeSeriesTable,
    windows: &[usize],
    feature: &str,
    f: F,
) -> Result<TimeSeriesTable, DataError>
where
    F: Fn(&[Option<f64>], usize) -> Vec<Option<f64>>,
{
    let mut columns = Vec::with_capacity(windows.len() * prices.n_columns());
    for &window in windows {
        for (c, asset) in prices.columns().iter().enumerate() {
            columns.push((
                format!("{asset}_{feature}_{window}p"),
                f(prices.column_at(c), window),
            ));
        }
    }
    Ok(TimeSeriesTable::new(prices.index().to_vec(), columns)?)
}

/// Trailing simple returns: `{asset}_return_{w}p`.
///
/// # Errors
///
/// Returns an error if two windows produce the same column name.
pub fn rolling_returns(
    prices: &TimeSeriesTable,
    windows: &[usize],
) -> Result<TimeSeriesTable, DataError> {
    per_window(prices, windows, "return", pct_change)
}

/// Sample std of one-bar returns: `{asset}_volatility_{w}p`.
///
/// # Errors
///
/// Returns an error if two windows produce the same column name.
pub fn rolling_volatility(
    prices: &TimeSeriesTable,
    windows: &[usize],
) -> Result<TimeSeriesTable, DataError> {
    per_window(prices, windows, "volatility", |col, w| {
        rolling_std(&pct_change(col, 1), w)
    })
}

/// Price over its trailing mean: `{asset}_ma_ratio_{w}p`.
///
/// # Errors
///
/// Returns an error if two windows produce the same column name.
pub fn moving_average_ratios(
    prices: &TimeSeriesTable,
    windows: &[usize],
) -> Result<TimeSeriesTable, DataError> {
    per_window(prices, windows, "ma_ratio", |col, w| {
        col.iter()
            .zip(rolling_mean(col, w))
            .map(|(p, ma)| {
                let ma = ma?;
                (ma != 0.0).then_some((*p)? / ma)
            })
            .collect()
    })
}

/// Relative strength index on a 0..100 scale: `{asset}_rsi_{w}p`.
///
/// Gains and losses are averaged with a simple trailing mean. Missing when the average
/// loss is zero.
///
/// # Errors
///
/// Returns an error if the result cannot be assembled into a table.
pub fn rsi(prices: &TimeSeriesTable, window: usize) -> Result<TimeSeriesTable, DataError> {
    per_window(prices, &[window], "rsi", |col, w| {
        let delta = diff(col);
        let gains: Vec<Option<f64>> = delta.iter().map(|d| d.map(|d| d.max(0.0))).collect();
        let losses: Vec<Option<f64>> = delta.iter().map(|d| d.map(|d| (-d).max(0.0))).collect();
        rolling_mean(&gains, w)
            .into_iter()
            .zip(rolling_mean(&losses, w))
            .map(|(g, l)| {
                let (g, l) = (g?, l?);
                (l != 0.0).then(|| 100.0 - 100.0 / (1.0 + g / l))
            })
            .collect()
    })
}

/// Position inside the Bollinger bands: 0 at the lower band, 1 at the upper band.
/// `{asset}_bb_position_{w}p`. Missing when the bands have zero width.
///
/// # Errors
///
/// Returns an error if the result cannot be assembled into a table.
pub fn bollinger_position(
    prices: &TimeSeriesTable,
    window: usize,
    num_std: f64,
) -> Result<TimeSeriesTable, DataError> {
    per_window(prices, &[window], "bb_position", |col, w| {
        let ma = rolling_mean(col, w);
        let sd = rolling_std(col, w);
        (0..col.len())
            .map(|t| {
                let (p, ma, sd) = (col[t]?, ma[t]?, sd[t]?);
                let lower = ma - num_std * sd;
                let width = 2.0 * num_std * sd;
                (width != 0.0).then(|| (p - lower) / width)
            })
            .collect()
    })
}

/// Rate of change against the price `w` bars ago: `{asset}_roc_{w}p`.
///
/// # Errors
///
/// Returns an error if two windows produce the same column name.
pub fn momentum(prices: &TimeSeriesTable, windows: &[usize]) -> Result<TimeSeriesTable, DataError> {
    per_window(prices, windows, "roc", pct_change)
}

/// Latest value at or before each timestamp of `index`.
fn as_of(table: &TimeSeriesTable, index: &[Timestamp]) -> Result<TimeSeriesTable, DataError> {
    let positions: Vec<Option<usize>> = index
        .iter()
        .map(|ts| table.index().partition_point(|t| t <= ts).checked_sub(1))
        .collect();
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let col = table.column_at(c);
            (name.clone(), positions.iter().map(|p| p.and_then(|r| col[r])).collect())
        })
        .collect();
    Ok(TimeSeriesTable::new(index.to_vec(), columns)?)
}

/// Selected on-chain metrics, forward-filled and sampled as-of each timestamp of `index`.
/// Columns are prefixed `gn_`. Metrics absent from `onchain` are skipped with a warning.
///
/// # Errors
///
/// Returns an error if `index` is not strictly increasing.
pub fn onchain_features(
    onchain: &TimeSeriesTable,
    metrics: &[String],
    index: &[Timestamp],
) -> Result<TimeSeriesTable, DataError> {
    let (available, missing): (Vec<String>, Vec<String>) = metrics
        .iter()
        .cloned()
        .partition(|m| onchain.column_position(m).is_some());
    if !missing.is_empty() {
        warn!(?missing, "On-chain metrics not found, skipping");
    }

    let filled = onchain
        .select_columns(&available)?
        .map_columns(forward_fill);
    Ok(as_of(&filled, index)?.with_prefix("gn_"))
}

/// The full feature matrix on the price index.
///
/// Concatenates rolling returns, volatility, moving-average ratios, RSI, Bollinger position,
/// momentum, the current baseline signal (`signal_{asset}`, if enabled) and on-chain
/// metrics (if provided).
///
/// # Errors
///
/// Returns an error if any configured window is zero or two feature columns collide.
pub fn build_feature_matrix(
    prices: &TimeSeriesTable,
    signals: &TimeSeriesTable,
    onchain: Option<&TimeSeriesTable>,
    config: &FeatureConfig,
) -> Result<TimeSeriesTable, DataError> {
    validate_windows(config)?;

    let mut parts = vec![
        rolling_returns(prices, &config.return_windows)?,
        rolling_volatility(prices, &config.volatility_windows)?,
        moving_average_ratios(prices, &config.ma_windows)?,
        rsi(prices, config.rsi_window)?,
        bollinger_position(prices, config.bollinger_window, config.bollinger_std)?,
        momentum(prices, &config.momentum_windows)?,
    ];
    if config.include_signal {
        parts.push(signals.reindex(prices.index())?.with_prefix("signal_"));
    }
    if let Some(onchain) = onchain {
        parts.push(onchain_features(
            onchain,
            &config.onchain_metrics,
            prices.index(),
        )?);
    }

    let features = TimeSeriesTable::concat_columns(&parts)?;
    debug!(
        rows = features.n_rows(),
        columns = features.n_columns(),
        "Built feature matrix"
    );
    Ok(features)
}

fn validate_windows(config: &FeatureConfig) -> Result<(), DataError> {
    let checks: [(&'static str, bool); 6] = [
        ("return_windows", config.return_windows.contains(&0)),
        ("volatility_windows", config.volatility_windows.contains(&0)),
        ("ma_windows", config.ma_windows.contains(&0)),
        ("rsi_window", config.rsi_window == 0),
        ("bollinger_window", config.bollinger_window == 0),
        ("momentum_windows", config.momentum_windows.contains(&0)),
    ];
    match checks.iter().find(|(_, zero)| *zero) {
        Some((name, _)) => Err(DataError::InvalidWindow { name: *name }),
        None => Ok(()),
    }
}

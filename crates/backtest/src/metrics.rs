//! Risk and return statistics over a periodic return series.
//!
//! Every statistic has an explicit policy for degenerate input (zero variance, no losses,
//! no drawdown, empty series) so nothing here returns NaN for those cases. `+inf` is a
//! deliberate result for all-winning series in Sortino, Calmar and profit factor.
//!
//! Standard deviations are sample deviations (`n - 1`). A series too short to have one
//! is treated as having zero deviation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use walkforward_core::{MetricsConfig, Series};

/// 3-hour bars per year: 24 / 3 * 365.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 2920.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Annualized Sharpe ratio: `sqrt(ppy) * mean(r - rf/ppy) / std(r)`. Zero when std is 0.
#[must_use]
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let std = sample_std(returns);
    if std == 0.0 {
        return 0.0;
    }
    let excess = mean(returns) - risk_free_rate / periods_per_year;
    periods_per_year.sqrt() * excess / std
}

/// Annualized Sortino ratio using the deviation of negative returns.
///
/// With no negative returns, or zero deviation among them: `+inf` if the mean excess
/// return is positive, else 0.
#[must_use]
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let excess = mean(returns) - risk_free_rate / periods_per_year;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside_std = sample_std(&downside);

    if downside_std == 0.0 {
        return if excess > 0.0 { f64::INFINITY } else { 0.0 };
    }
    periods_per_year.sqrt() * excess / downside_std
}

/// Largest peak-to-trough decline of the compounded equity curve, as a positive fraction.
///
/// The curve starts at the first compounded value, so a loss in the very first period is
/// not a drawdown.
#[must_use]
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.min((equity - peak) / peak);
        }
    }
    worst.abs()
}

/// `prod(1 + r) - 1`.
#[must_use]
pub fn total_return(returns: &[f64]) -> f64 {
    returns.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
}

/// Geometric annualized return; 0 for an empty series.
#[must_use]
pub fn annualized_return(returns: &[f64], periods_per_year: f64) -> f64 {
    let years = returns.len() as f64 / periods_per_year;
    if years == 0.0 {
        return 0.0;
    }
    (1.0 + total_return(returns)).powf(1.0 / years) - 1.0
}

/// Annualized return over max drawdown.
///
/// Without drawdown: `+inf` if the mean return is positive, else 0.
#[must_use]
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let mdd = max_drawdown(returns);
    if mdd == 0.0 {
        return if mean(returns) > 0.0 { f64::INFINITY } else { 0.0 };
    }
    annualized_return(returns, periods_per_year) / mdd
}

/// Fraction of periods with a strictly positive return.
#[must_use]
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

/// Gross profits over gross losses; `+inf` with profits and no losses, 0 with neither.
#[must_use]
pub fn profit_factor(returns: &[f64]) -> f64 {
    let profits: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|r| **r < 0.0).sum::<f64>().abs();
    if losses == 0.0 {
        return if profits > 0.0 { f64::INFINITY } else { 0.0 };
    }
    profits / losses
}

/// `std(r) * sqrt(ppy)`.
#[must_use]
pub fn annualized_volatility(returns: &[f64], periods_per_year: f64) -> f64 {
    sample_std(returns) * periods_per_year.sqrt()
}

/// Periods with a nonzero return.
#[must_use]
pub fn trade_count(returns: &[f64]) -> usize {
    returns.iter().filter(|r| **r != 0.0).count()
}

/// The full metric set for one return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub n_trades: usize,
    pub volatility_annual: f64,
}

impl PerformanceMetrics {
    /// Metric names in report order.
    pub const NAMES: [&'static str; 10] = [
        "total_return",
        "annualized_return",
        "sharpe_ratio",
        "sortino_ratio",
        "max_drawdown",
        "calmar_ratio",
        "win_rate",
        "profit_factor",
        "n_trades",
        "volatility_annual",
    ];

    /// Computes every metric over `returns`.
    #[must_use]
    pub fn from_returns(returns: &[f64], config: &MetricsConfig) -> Self {
        let ppy = config.periods_per_year;
        Self {
            total_return: total_return(returns),
            annualized_return: annualized_return(returns, ppy),
            sharpe_ratio: sharpe_ratio(returns, config.risk_free_rate, ppy),
            sortino_ratio: sortino_ratio(returns, config.risk_free_rate, ppy),
            max_drawdown: max_drawdown(returns),
            calmar_ratio: calmar_ratio(returns, ppy),
            win_rate: win_rate(returns),
            profit_factor: profit_factor(returns),
            n_trades: trade_count(returns),
            volatility_annual: annualized_volatility(returns, ppy),
        }
    }

    /// Computes every metric over the present values of `returns`.
    #[must_use]
    pub fn from_series(returns: &Series, config: &MetricsConfig) -> Self {
        Self::from_returns(&returns.present_values(), config)
    }

    /// Looks up a metric by report name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "total_return" => self.total_return,
            "annualized_return" => self.annualized_return,
            "sharpe_ratio" => self.sharpe_ratio,
            "sortino_ratio" => self.sortino_ratio,
            "max_drawdown" => self.max_drawdown,
            "calmar_ratio" => self.calmar_ratio,
            "win_rate" => self.win_rate,
            "profit_factor" => self.profit_factor,
            "n_trades" => self.n_trades as f64,
            "volatility_annual" => self.volatility_annual,
            _ => return None,
        };
        Some(value)
    }

    /// Flat name → value mapping for reporting.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Self::NAMES
            .iter()
            .filter_map(|name| self.get(name).map(|v| ((*name).to_string(), v)))
            .collect()
    }
}

/// Computes the full metric set with the given annualization.
#[must_use]
pub fn compute_all_metrics(returns: &Series, periods_per_year: f64) -> PerformanceMetrics {
    let config = MetricsConfig {
        periods_per_year,
        ..MetricsConfig::default()
    };
    PerformanceMetrics::from_series(returns, &config)
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration detected before any computation runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter has a value outside its allowed domain.
    #[error("Invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub walk_forward: WalkForwardConfig,
    pub metrics: MetricsConfig,
    pub model: ModelConfig,
    pub features: FeatureConfig,
    pub labels: LabelConfig,
}

/// Where input CSV files live. The directory is always explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub prices_file: String,
    pub signals_file: String,
    /// Optional on-chain metrics file; skipped when absent.
    pub onchain_file: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            prices_file: "price_data.csv".to_string(),
            signals_file: "trade_log.csv".to_string(),
            onchain_file: None,
        }
    }
}

/// Parameters of a walk-forward run. Sizes are row counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Rows in each training window.
    pub train_size: usize,
    /// Rows in each test window.
    pub test_size: usize,
    /// Offset advance between folds; `None` or 0 means `test_size`.
    pub step_size: Option<usize>,
    /// Cost charged per unit of signal change.
    pub transaction_cost: f64,
    /// Probability threshold for the filter (strict `>`).
    pub threshold: f64,
    /// Rows dropped from the end of each training window before fitting. Set it to the
    /// label horizon so no training label looks into the test window.
    pub purge: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_size: 2920, // one year of 3h bars
            test_size: 730,
            step_size: None,
            transaction_cost: 0.001,
            threshold: 0.5,
            purge: 0,
        }
    }
}

impl WalkForwardConfig {
    /// Creates a config with the given window sizes and default cost/threshold.
    #[must_use]
    pub fn new(train_size: usize, test_size: usize) -> Self {
        Self {
            train_size,
            test_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_step_size(mut self, step_size: usize) -> Self {
        self.step_size = Some(step_size);
        self
    }

    #[must_use]
    pub fn with_transaction_cost(mut self, transaction_cost: f64) -> Self {
        self.transaction_cost = transaction_cost;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_purge(mut self, purge: usize) -> Self {
        self.purge = purge;
        self
    }

    /// Step size after applying the `test_size` fallback.
    #[must_use]
    pub fn effective_step(&self) -> usize {
        match self.step_size {
            Some(step) if step > 0 => step,
            _ => self.test_size,
        }
    }

    /// Checks every parameter.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_window_sizes(self.train_size, self.test_size)?;
        if self.purge >= self.train_size {
            return Err(ConfigError::invalid(
                "purge",
                self.purge,
                "must be smaller than train_size",
            ));
        }
        validate_threshold(self.threshold)?;
        validate_transaction_cost(self.transaction_cost)
    }
}

/// Both window sizes must be positive.
///
/// # Errors
///
/// Returns an error naming the first zero-sized window.
pub fn validate_window_sizes(train_size: usize, test_size: usize) -> Result<(), ConfigError> {
    if train_size == 0 {
        return Err(ConfigError::invalid("train_size", train_size, "must be > 0"));
    }
    if test_size == 0 {
        return Err(ConfigError::invalid("test_size", test_size, "must be > 0"));
    }
    Ok(())
}

/// Threshold must lie in [0, 1].
///
/// # Errors
///
/// Returns an error for values outside [0, 1] or NaN.
pub fn validate_threshold(threshold: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::invalid("threshold", threshold, "must be within [0, 1]"))
    }
}

/// Transaction cost must be finite and non-negative.
///
/// # Errors
///
/// Returns an error for negative, infinite or NaN costs.
pub fn validate_transaction_cost(cost: f64) -> Result<(), ConfigError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            "transaction_cost",
            cost,
            "must be finite and >= 0",
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 3-hour bars: 24 / 3 * 365.
    pub periods_per_year: f64,
    /// Annualized.
    pub risk_free_rate: f64,
    pub initial_capital: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 2920.0,
            risk_free_rate: 0.0,
            initial_capital: 1.0,
        }
    }
}

/// Hyperparameters for the bundled logistic-regression adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    /// L2 penalty strength; 0 disables regularization.
    pub l2: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 500,
            tolerance: 1e-6,
            l2: 0.01,
        }
    }
}

/// Lookback windows for the feature builder, in bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub return_windows: Vec<usize>,
    pub volatility_windows: Vec<usize>,
    pub ma_windows: Vec<usize>,
    pub rsi_window: usize,
    pub bollinger_window: usize,
    pub bollinger_std: f64,
    pub momentum_windows: Vec<usize>,
    pub include_signal: bool,
    pub onchain_metrics: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            return_windows: vec![1, 8, 56, 224],
            volatility_windows: vec![56, 224],
            ma_windows: vec![56, 224, 672],
            rsi_window: 112,
            bollinger_window: 160,
            bollinger_std: 2.0,
            momentum_windows: vec![8, 56, 224],
            include_signal: true,
            onchain_metrics: [
                "btc_mvrv_z_score",
                "btc_adjusted_sopr",
                "btc_fear_greed_index",
                "reserve_risk",
                "btc_puell_multiple",
                "btc_percent_upply_in_profit",
                "btc_futures_perpetual_funding_rate_mean",
                "btc_stablecoin_supply_ratio_oscillator",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
        }
    }
}

/// How forward-looking training labels are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Holding period in bars.
    pub horizon: usize,
    pub entry_cost: f64,
    pub exit_cost: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            horizon: 8,
            entry_cost: 0.001,
            exit_cost: 0.001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_forward_default_step_is_test_size() {
        let config = WalkForwardConfig::new(100, 20);
        assert_eq!(config.effective_step(), 20);
    }

    #[test]
    fn walk_forward_zero_step_falls_back_to_test_size() {
        let config = WalkForwardConfig::new(100, 20).with_step_size(0);
        assert_eq!(config.effective_step(), 20);
    }

    #[test]
    fn walk_forward_custom_step() {
        let config = WalkForwardConfig::new(100, 20).with_step_size(5);
        assert_eq!(config.effective_step(), 5);
    }

    #[test]
    fn validate_rejects_zero_train_size() {
        let err = WalkForwardConfig::new(0, 20).validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "train_size",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_zero_test_size() {
        let err = WalkForwardConfig::new(10, 0).validate().unwrap_err();
        assert!(err.to_string().contains("test_size"));
    }

    #[test]
    fn validate_rejects_threshold_above_one() {
        let err = WalkForwardConfig::new(10, 5)
            .with_threshold(1.5)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("threshold = 1.5"));
    }

    #[test]
    fn validate_rejects_purge_covering_train_window() {
        let err = WalkForwardConfig::new(10, 5)
            .with_purge(10)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("purge = 10"));
        assert!(WalkForwardConfig::new(10, 5).with_purge(9).validate().is_ok());
    }

    #[test]
    fn validate_rejects_nan_threshold() {
        assert!(validate_threshold(f64::NAN).is_err());
    }

    #[test]
    fn validate_accepts_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
    }

    #[test]
    fn validate_rejects_negative_cost() {
        let err = WalkForwardConfig::new(10, 5)
            .with_transaction_cost(-0.001)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("transaction_cost"));
    }

    #[test]
    fn app_config_deserializes_partial_toml_with_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"walk_forward": {"train_size": 50}}"#).unwrap();
        assert_eq!(config.walk_forward.train_size, 50);
        assert_eq!(config.walk_forward.test_size, 730);
        assert!((config.metrics.periods_per_year - 2920.0).abs() < f64::EPSILON);
    }
}

//! Dataset loading, feature engineering and label construction for walk-forward backtests.
//!
//! This crate provides:
//! - CSV loading of price, signal and on-chain tables
//! - Lookahead-free technical and on-chain features
//! - Forward-looking training labels and their class balance

pub mod error;
pub mod features;
pub mod labels;
pub mod loader;
mod rolling;
pub mod summary;

pub use error::DataError;
pub use features::{
    bollinger_position, build_feature_matrix, momentum, moving_average_ratios, onchain_features,
    rolling_returns, rolling_volatility, rsi,
};
pub use labels::{
    cost_adjusted_labels, forward_return_labels, labels_from_config, pooled_label,
    risk_adjusted_labels, LabelDistribution, LabelStats, LABEL_COLUMN,
};
pub use loader::{
    align_datasets, compute_log_returns, compute_returns, parse_timestamp, read_csv_table,
    write_csv_table, DataLoader,
};
pub use summary::DataSummary;

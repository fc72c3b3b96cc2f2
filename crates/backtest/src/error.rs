use thiserror::Error;
use walkforward_core::{ConfigError, TableError};

/// Errors from the backtest pipeline.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Invalid run parameters, raised before any computation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Table construction or reshaping failed.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// The model returned the wrong number of probabilities for a test window.
    #[error("Fold {fold}: model returned {got} probabilities for {expected} test rows")]
    PredictionLength {
        fold: usize,
        expected: usize,
        got: usize,
    },

    /// Failure inside the model adapter, passed through as-is.
    #[error(transparent)]
    Model(anyhow::Error),
}

//! Probability models that plug into the walk-forward runner.

pub mod logistic;

pub use logistic::{LogisticModel, LogisticRegressionError, LogisticTrainer};

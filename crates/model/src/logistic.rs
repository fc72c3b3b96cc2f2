//! L2-regularized logistic regression over a feature table.
//!
//! Features are standardized with the training window's mean and deviation. Training uses
//! only rows where the label and every feature are present; at prediction time a missing
//! feature is imputed with its training mean.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use walkforward_core::{ModelConfig, ModelTrainer, ProbabilityModel, TimeSeriesTable};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogisticRegressionError {
    #[error("Invalid {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Labels must have exactly one column, got {0}")]
    LabelColumns(usize),

    #[error("Labels have {labels} rows but features have {features}")]
    RowMismatch { features: usize, labels: usize },

    #[error("No training row has a label and a complete feature set")]
    NoTrainingRows,

    #[error("Training labels contain a single class ({0})")]
    SingleClass(f64),

    #[error("Feature column '{0}' seen in training is missing")]
    MissingFeature(String),

    #[error("Design matrix needs {expected} cells, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let exp_z = z.exp();
        exp_z / (1.0 + exp_z)
    }
}

/// Binary cross-entropy with clipped probabilities.
fn log_loss(y: &Array1<f64>, p: &Array1<f64>) -> f64 {
    let eps = 1e-15;
    -y.iter()
        .zip(p)
        .map(|(&y, &p)| {
            let p = p.clamp(eps, 1.0 - eps);
            y * p.ln() + (1.0 - y) * (1.0 - p).ln()
        })
        .sum::<f64>()
        / y.len() as f64
}

/// Fits a [`LogisticModel`] per training window.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticTrainer {
    learning_rate: f64,
    max_iter: usize,
    tolerance: f64,
    l2: f64,
}

impl Default for LogisticTrainer {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

impl LogisticTrainer {
    #[must_use]
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            l2: config.l2,
        }
    }

    fn validate(&self) -> Result<(), LogisticRegressionError> {
        let invalid = |name, value| Err(LogisticRegressionError::InvalidParameter { name, value });
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate", self.learning_rate);
        }
        if !(self.l2.is_finite() && self.l2 >= 0.0) {
            return invalid("l2", self.l2);
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return invalid("tolerance", self.tolerance);
        }
        Ok(())
    }

    /// Fits on the rows of `features` whose label and features are all present.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid hyperparameters, a label table without exactly one
    /// column or with a different row count, no usable rows, or a single label class.
    pub fn fit(
        &self,
        features: &TimeSeriesTable,
        labels: &TimeSeriesTable,
    ) -> Result<LogisticModel, LogisticRegressionError> {
        self.validate()?;
        if labels.n_columns() != 1 {
            return Err(LogisticRegressionError::LabelColumns(labels.n_columns()));
        }
        if labels.n_rows() != features.n_rows() {
            return Err(LogisticRegressionError::RowMismatch {
                features: features.n_rows(),
                labels: labels.n_rows(),
            });
        }

        let n_features = features.n_columns();
        let mut flat: Vec<f64> = Vec::new();
        let mut targets: Vec<f64> = Vec::new();
        for (row, label) in labels.column_at(0).iter().enumerate() {
            let Some(label) = label else { continue };
            let values: Option<Vec<f64>> = features.row(row).into_iter().collect();
            if let Some(values) = values {
                flat.extend(values);
                targets.push(if *label > 0.5 { 1.0 } else { 0.0 });
            }
        }

        let Some(&first) = targets.first() else {
            return Err(LogisticRegressionError::NoTrainingRows);
        };
        if targets.iter().all(|v| *v == first) {
            return Err(LogisticRegressionError::SingleClass(first));
        }

        let y = Array1::from(targets);
        let got = flat.len();
        let raw = Array2::from_shape_vec((y.len(), n_features), flat).map_err(|_| {
            LogisticRegressionError::DimensionMismatch {
                expected: y.len() * n_features,
                got,
            }
        })?;

        let means = raw
            .mean_axis(Axis(0))
            .ok_or(LogisticRegressionError::NoTrainingRows)?;
        // Constant columns keep a unit scale
        let scales = raw
            .std_axis(Axis(0), 0.0)
            .mapv(|sd| if sd > 0.0 { sd } else { 1.0 });
        let x = (&raw - &means) / &scales;

        let n = y.len() as f64;
        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0_f64;
        let mut prev_cost = f64::INFINITY;
        let mut iterations = 0;
        let mut cost = f64::NAN;

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let predictions = (x.dot(&weights) + bias).mapv(sigmoid);
            let errors = &predictions - &y;

            let dw = x.t().dot(&errors) / n + &weights * self.l2;
            let db = errors.sum() / n;
            weights = &weights - &(dw * self.learning_rate);
            bias -= self.learning_rate * db;

            cost = log_loss(&y, &predictions);
            if (prev_cost - cost).abs() < self.tolerance {
                debug!(iteration = iter, cost, "Converged");
                break;
            }
            prev_cost = cost;
        }

        debug!(
            rows = y.len(),
            features = n_features,
            iterations,
            cost,
            "Fitted logistic model"
        );

        Ok(LogisticModel {
            columns: features.columns().to_vec(),
            means,
            scales,
            weights,
            intercept: bias,
            iterations,
            training_rows: y.len(),
        })
    }
}

impl ModelTrainer for LogisticTrainer {
    type Model = LogisticModel;

    fn train(
        &self,
        features: &TimeSeriesTable,
        labels: &TimeSeriesTable,
    ) -> anyhow::Result<LogisticModel> {
        Ok(self.fit(features, labels)?)
    }
}

/// A fitted logistic regression with its standardization parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    columns: Vec<String>,
    means: Array1<f64>,
    scales: Array1<f64>,
    weights: Array1<f64>,
    intercept: f64,
    iterations: usize,
    training_rows: usize,
}

impl LogisticModel {
    /// Coefficients on the standardized features, in training column order.
    #[must_use]
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.weights
    }

    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[must_use]
    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Positive-class probability per row. Columns are matched by name, so extra columns
    /// are ignored and order does not matter.
    ///
    /// # Errors
    ///
    /// Returns an error if a training column is absent from `features`.
    pub fn probabilities(
        &self,
        features: &TimeSeriesTable,
    ) -> Result<Vec<f64>, LogisticRegressionError> {
        let positions = self
            .columns
            .iter()
            .map(|name| {
                features
                    .column_position(name)
                    .ok_or_else(|| LogisticRegressionError::MissingFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // A missing value is imputed with the training mean, which standardizes to 0
        let x = Array2::from_shape_fn((features.n_rows(), positions.len()), |(row, j)| {
            features
                .value(row, positions[j])
                .map_or(0.0, |v| (v - self.means[j]) / self.scales[j])
        });
        Ok((x.dot(&self.weights) + self.intercept)
            .mapv(sigmoid)
            .to_vec())
    }
}

impl ProbabilityModel for LogisticModel {
    fn predict_proba(&self, features: &TimeSeriesTable) -> anyhow::Result<Vec<f64>> {
        Ok(self.probabilities(features)?)
    }
}

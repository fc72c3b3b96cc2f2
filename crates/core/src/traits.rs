use crate::table::TimeSeriesTable;
use anyhow::Result;

/// A fitted predictor exposing the probability of the positive class.
pub trait ProbabilityModel {
    /// Returns one probability per row of `features`, in row order.
    fn predict_proba(&self, features: &TimeSeriesTable) -> Result<Vec<f64>>;
}

/// Builds a fitted [`ProbabilityModel`] from a training window.
///
/// Closures `Fn(&TimeSeriesTable, &TimeSeriesTable) -> Result<M>` implement this trait, so a
/// model factory can be passed inline.
pub trait ModelTrainer {
    type Model: ProbabilityModel;

    fn train(&self, features: &TimeSeriesTable, labels: &TimeSeriesTable) -> Result<Self::Model>;
}

impl<F, M> ModelTrainer for F
where
    F: Fn(&TimeSeriesTable, &TimeSeriesTable) -> Result<M>,
    M: ProbabilityModel,
{
    type Model = M;

    fn train(&self, features: &TimeSeriesTable, labels: &TimeSeriesTable) -> Result<M> {
        self(features, labels)
    }
}

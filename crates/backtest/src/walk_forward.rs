//! Walk-forward evaluation of a probability-filtered strategy.
//!
//! For each fold the model is trained on the train rows only and scores the test rows
//! that follow, so every probability is out-of-sample. The stitched probabilities gate the
//! baseline signals, and returns are computed only over the scored timestamps.
//!
//! # Walk-Forward Process
//!
//! 1. Schedule folds over the feature rows
//! 2. Train on each fold's train window, predict its test window
//! 3. Stitch test-window probabilities in fold order (later folds win on overlap)
//! 4. Broadcast the probability across assets and filter the baseline signals
//! 5. Compute net asset returns and the equal-weight portfolio return

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkforward_core::{
    ColumnAlignment, ModelTrainer, ProbabilityModel, Series, TimeSeriesTable, Timestamp,
    WalkForwardConfig,
};

use crate::error::BacktestError;
use crate::filter::apply_filter;
use crate::folds::{FoldRecord, FoldSchedule};
use crate::returns::{compute_portfolio_returns, compute_strategy_returns, PORTFOLIO_COLUMN};

/// Name of the stitched out-of-sample probability series.
pub const PROBABILITY_COLUMN: &str = "probability";

/// Everything a walk-forward run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardOutput {
    /// Baseline signals gated by the out-of-sample probability.
    pub filtered_signals: TimeSeriesTable,
    /// Equal-weight portfolio return of the filtered signals.
    pub portfolio_returns: Series,
    /// Net per-asset returns of the filtered signals.
    pub asset_returns: TimeSeriesTable,
    /// Stitched out-of-sample probabilities.
    pub probabilities: Series,
    /// One record per fold, in fold order.
    pub folds: Vec<FoldRecord>,
    /// Signal/price column alignment used for the return calculation.
    pub alignment: ColumnAlignment,
}

impl WalkForwardOutput {
    fn empty(signals: &TimeSeriesTable, prices: &TimeSeriesTable) -> Self {
        let alignment = signals.align_columns(prices);
        Self {
            filtered_signals: TimeSeriesTable::empty(signals.columns()),
            portfolio_returns: Series::empty(PORTFOLIO_COLUMN),
            asset_returns: TimeSeriesTable::empty(&alignment.common),
            probabilities: Series::empty(PROBABILITY_COLUMN),
            folds: Vec::new(),
            alignment,
        }
    }

    /// Timestamps that received an out-of-sample probability.
    #[must_use]
    pub fn scored_index(&self) -> &[Timestamp] {
        self.probabilities.index()
    }

    #[must_use]
    pub fn num_folds(&self) -> usize {
        self.folds.len()
    }
}

/// Runs walk-forward evaluations for one configuration.
#[derive(Debug, Clone)]
pub struct WalkForwardRunner {
    config: WalkForwardConfig,
}

impl WalkForwardRunner {
    #[must_use]
    pub fn new(config: WalkForwardConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Trains and scores every fold, then filters `signals` and computes returns.
    ///
    /// Folds are scheduled over the rows of `features`; `labels` is sliced by the same
    /// positions. Zero folds is not an error and yields empty outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a window cannot be sliced, the
    /// model returns the wrong number of probabilities, or the model adapter fails (its
    /// error is passed through unchanged).
    pub fn run<T: ModelTrainer>(
        &self,
        signals: &TimeSeriesTable,
        prices: &TimeSeriesTable,
        trainer: &T,
        features: &TimeSeriesTable,
        labels: &TimeSeriesTable,
    ) -> Result<WalkForwardOutput, BacktestError> {
        self.config.validate()?;
        let schedule = FoldSchedule::new(
            features.n_rows(),
            self.config.train_size,
            self.config.test_size,
            self.config.step_size,
        )?;

        info!(
            periods = features.n_rows(),
            folds = schedule.len(),
            train_size = self.config.train_size,
            test_size = self.config.test_size,
            step_size = schedule.step_size(),
            purge = self.config.purge,
            "Starting walk-forward run"
        );

        if schedule.is_empty() {
            info!("No complete fold fits the data, returning empty results");
            return Ok(WalkForwardOutput::empty(signals, prices));
        }

        let mut stitched: BTreeMap<Timestamp, f64> = BTreeMap::new();
        let mut folds = Vec::with_capacity(schedule.len());

        for fold in &schedule {
            let train = fold.train_range();
            let train = train.start..train.end - self.config.purge;
            let train_x = features.slice_rows(train.clone())?;
            let train_y = labels.slice_rows(train)?;
            let test_x = features.slice_rows(fold.test_range())?;

            let model = trainer
                .train(&train_x, &train_y)
                .map_err(BacktestError::Model)?;
            let probs = model.predict_proba(&test_x).map_err(BacktestError::Model)?;
            if probs.len() != test_x.n_rows() {
                return Err(BacktestError::PredictionLength {
                    fold: fold.index,
                    expected: test_x.n_rows(),
                    got: probs.len(),
                });
            }

            for (ts, p) in test_x.index().iter().zip(probs) {
                stitched.insert(*ts, p);
            }
            if let Some(record) = FoldRecord::from_fold(&fold, features.index()) {
                debug!(
                    fold = record.fold,
                    train_start = %record.train_start,
                    test_start = %record.test_start,
                    test_end = %record.test_end,
                    "Fold scored"
                );
                folds.push(record);
            }
        }

        let (index, values): (Vec<Timestamp>, Vec<Option<f64>>) =
            stitched.into_iter().map(|(ts, p)| (ts, Some(p))).unzip();
        let probabilities = Series::new(PROBABILITY_COLUMN, index, values)?;

        let scored_signals = signals.reindex(probabilities.index())?;
        let prob_table = TimeSeriesTable::broadcast(&probabilities, signals.columns());
        let filtered_signals = apply_filter(&scored_signals, &prob_table, self.config.threshold)?;

        let scored_prices = prices.reindex(probabilities.index())?;
        let returns = compute_strategy_returns(
            &filtered_signals,
            &scored_prices,
            self.config.transaction_cost,
        )?;
        let portfolio_returns = compute_portfolio_returns(&returns.net, None);

        info!(
            folds = folds.len(),
            scored = probabilities.len(),
            assets = returns.alignment.common.len(),
            "Walk-forward run complete"
        );

        Ok(WalkForwardOutput {
            filtered_signals,
            portfolio_returns,
            asset_returns: returns.net,
            probabilities,
            folds,
            alignment: returns.alignment,
        })
    }
}

/// Runs a walk-forward evaluation with an explicit parameter list.
///
/// # Errors
///
/// See [`WalkForwardRunner::run`].
#[allow(clippy::too_many_arguments)]
pub fn run_walk_forward<T: ModelTrainer>(
    signals: &TimeSeriesTable,
    prices: &TimeSeriesTable,
    trainer: &T,
    features: &TimeSeriesTable,
    labels: &TimeSeriesTable,
    train_size: usize,
    test_size: usize,
    step_size: Option<usize>,
    transaction_cost: f64,
    threshold: f64,
) -> Result<WalkForwardOutput, BacktestError> {
    let config = WalkForwardConfig {
        train_size,
        test_size,
        step_size,
        transaction_cost,
        threshold,
        purge: 0,
    };
    WalkForwardRunner::new(config).run(signals, prices, trainer, features, labels)
}

/// Portfolio return of the unfiltered `signals` over `index`, for comparison with a
/// walk-forward run scored on the same timestamps.
///
/// Prices are restricted to `index`, so the last scored row has no forward return.
///
/// # Errors
///
/// Returns an error for an invalid `transaction_cost` or a non-increasing `index`.
pub fn baseline_portfolio_returns(
    signals: &TimeSeriesTable,
    prices: &TimeSeriesTable,
    index: &[Timestamp],
    transaction_cost: f64,
) -> Result<Series, BacktestError> {
    let returns = compute_strategy_returns(
        &signals.reindex(index)?,
        &prices.reindex(index)?,
        transaction_cost,
    )?;
    Ok(compute_portfolio_returns(&returns.net, None))
}

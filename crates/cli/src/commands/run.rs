//! Walk-forward run command.
//!
//! Loads the datasets, builds features and labels, runs the filtered strategy through the
//! walk-forward runner and compares it with the unfiltered baseline over the same
//! out-of-sample timestamps.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{info, warn};
use walkforward_backtest::{
    baseline_portfolio_returns, compare_strategies, FoldRecord, MetricsFormatter,
    StrategyComparison, WalkForwardOutput, WalkForwardRunner,
};
use walkforward_core::{AppConfig, TimeSeriesTable, WalkForwardConfig};
use walkforward_data::{
    align_datasets, build_feature_matrix, labels_from_config, pooled_label, write_csv_table,
    DataLoader, LABEL_COLUMN,
};
use walkforward_model::LogisticTrainer;

/// Arguments for the run command. Flags override the loaded configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory holding the dataset CSV files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Training window length in bars
    #[arg(long)]
    pub train_size: Option<usize>,

    /// Test window length in bars
    #[arg(long)]
    pub test_size: Option<usize>,

    /// Bars between fold starts (defaults to the test size)
    #[arg(long)]
    pub step_size: Option<usize>,

    /// Probability a signal must exceed to be kept
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Cost per unit of position change
    #[arg(long)]
    pub transaction_cost: Option<f64>,

    /// Training rows dropped before each test window
    #[arg(long)]
    pub purge: Option<usize>,

    /// Write a JSON report to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the filtered signals as CSV to this path
    #[arg(long)]
    pub signals_out: Option<PathBuf>,
}

impl RunArgs {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.data.data_dir = dir.clone();
        }
        let wf = &mut config.walk_forward;
        if let Some(v) = self.train_size {
            wf.train_size = v;
        }
        if let Some(v) = self.test_size {
            wf.test_size = v;
        }
        if self.step_size.is_some() {
            wf.step_size = self.step_size;
        }
        if let Some(v) = self.threshold {
            wf.threshold = v;
        }
        if let Some(v) = self.transaction_cost {
            wf.transaction_cost = v;
        }
        if let Some(v) = self.purge {
            wf.purge = v;
        }
    }
}

/// Everything written to the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub walk_forward: WalkForwardConfig,
    /// Bars each label looks ahead.
    pub label_horizon: usize,
    /// Whether the last training labels of a fold use prices from its test window.
    pub labels_overlap_test: bool,
    pub folds: Vec<FoldRecord>,
    pub scored_periods: usize,
    pub dropped_columns: Vec<String>,
    pub comparison: StrategyComparison,
}

/// Result of a full pipeline run, kept in memory for printing and reporting.
pub struct RunOutcome {
    pub output: WalkForwardOutput,
    pub comparison: StrategyComparison,
    pub report: RunReport,
}

/// Loads data, trains per fold and compares filtered against baseline returns.
///
/// # Errors
///
/// Returns an error if loading, feature or label construction, or the walk-forward run
/// fails.
pub fn run_pipeline(config: &AppConfig) -> Result<RunOutcome> {
    config
        .walk_forward
        .validate()
        .context("Invalid walk-forward configuration")?;
    let labels_overlap_test = config.walk_forward.purge < config.labels.horizon;
    if labels_overlap_test {
        warn!(
            purge = config.walk_forward.purge,
            horizon = config.labels.horizon,
            "Training labels overlap the following test window, set purge >= horizon"
        );
    }

    let loader = DataLoader::from_config(&config.data);
    let prices = loader.load_prices().context("Failed to load prices")?;
    let signals = loader.load_signals().context("Failed to load signals")?;
    let onchain = loader
        .load_onchain()
        .context("Failed to load on-chain metrics")?;

    let mut tables = vec![&signals, &prices];
    if let Some(onchain) = &onchain {
        tables.push(onchain);
    }
    let mut aligned = align_datasets(&tables).into_iter();
    let (Some(signals), Some(prices)) = (aligned.next(), aligned.next()) else {
        anyhow::bail!("Dataset alignment returned too few tables");
    };
    let onchain = aligned.next();
    info!(
        rows = prices.n_rows(),
        start = ?prices.index().first(),
        end = ?prices.index().last(),
        "Aligned datasets"
    );

    let features = build_feature_matrix(&prices, &signals, onchain.as_ref(), &config.features)
        .context("Failed to build features")?;
    let labels = labels_from_config(&prices, &signals, &config.labels)
        .context("Failed to build labels")?;
    let pooled = pooled_label(&labels)?;
    let labels = TimeSeriesTable::broadcast(&pooled, &[LABEL_COLUMN.to_string()])
        .reindex(features.index())?;

    let trainer = LogisticTrainer::from_config(&config.model);
    let runner = WalkForwardRunner::new(config.walk_forward.clone());
    let output = runner.run(&signals, &prices, &trainer, &features, &labels)?;
    if output.folds.is_empty() {
        warn!(
            rows = features.n_rows(),
            train_size = config.walk_forward.train_size,
            test_size = config.walk_forward.test_size,
            "Not enough data for a single fold"
        );
    }

    let baseline = baseline_portfolio_returns(
        &signals,
        &prices,
        output.scored_index(),
        config.walk_forward.transaction_cost,
    )?;
    let comparison = compare_strategies(&baseline, &output.portfolio_returns, &config.metrics);

    let report = RunReport {
        walk_forward: config.walk_forward.clone(),
        label_horizon: config.labels.horizon,
        labels_overlap_test,
        folds: output.folds.clone(),
        scored_periods: output.scored_index().len(),
        dropped_columns: output.alignment.dropped(),
        comparison: comparison.clone(),
    };
    Ok(RunOutcome {
        output,
        comparison,
        report,
    })
}

/// Runs the pipeline, prints the results and writes the optional outputs.
///
/// # Errors
///
/// Returns an error if the pipeline fails or an output file cannot be written.
pub fn run_walk_forward(args: &RunArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);
    let outcome = run_pipeline(&config)?;

    println!("{}", MetricsFormatter::format_folds(&outcome.output.folds));
    println!(
        "{}",
        MetricsFormatter::format("BASELINE STRATEGY", &outcome.comparison.baseline)
    );
    println!(
        "{}",
        MetricsFormatter::format("FILTERED STRATEGY", &outcome.comparison.candidate)
    );
    println!("{}", MetricsFormatter::format_comparison(&outcome.comparison));

    if let Some(path) = &args.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &outcome.report)
            .context("Failed to write JSON report")?;
        info!(path = %path.display(), "Wrote report");
    }
    if let Some(path) = &args.signals_out {
        write_csv_table(path, &outcome.output.filtered_signals)?;
        info!(path = %path.display(), "Wrote filtered signals");
    }

    Ok(())
}

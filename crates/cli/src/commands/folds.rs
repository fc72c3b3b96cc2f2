//! Fold schedule command.
//!
//! Prints the walk-forward folds either for an explicit period count or for the rows of
//! the configured price file.

use anyhow::{Context, Result};
use clap::Args;
use walkforward_backtest::{generate_folds, Fold, FoldRecord, MetricsFormatter};
use walkforward_core::AppConfig;
use walkforward_data::DataLoader;

/// Arguments for the folds command.
#[derive(Args, Debug, Clone, Default)]
pub struct FoldsArgs {
    /// Number of periods to schedule over (defaults to the price file's row count)
    #[arg(long)]
    pub periods: Option<usize>,

    /// Training window length in bars
    #[arg(long)]
    pub train_size: Option<usize>,

    /// Test window length in bars
    #[arg(long)]
    pub test_size: Option<usize>,

    /// Bars between fold starts (defaults to the test size)
    #[arg(long)]
    pub step_size: Option<usize>,
}

/// Renders positional folds when no timestamps are available.
pub fn format_positional(folds: &[Fold]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:>4}  {:>10}  {:>10}  {:>10}  {:>10}\n",
        "Fold", "Train", "Train End", "Test", "Test End"
    ));
    for f in folds {
        output.push_str(&format!(
            "{:>4}  {:>10}  {:>10}  {:>10}  {:>10}\n",
            f.index, f.train_start, f.train_end, f.test_start, f.test_end
        ));
    }
    output.push_str(&format!("Total folds: {}\n", folds.len()));
    output
}

/// Prints the fold schedule.
///
/// # Errors
///
/// Returns an error for zero window sizes or if the price file cannot be loaded.
pub fn run_folds(args: &FoldsArgs, config: &AppConfig) -> Result<()> {
    let wf = &config.walk_forward;
    let train = args.train_size.unwrap_or(wf.train_size);
    let test = args.test_size.unwrap_or(wf.test_size);
    let step = args.step_size.or(wf.step_size);

    if let Some(periods) = args.periods {
        let folds = generate_folds(periods, train, test, step)?;
        print!("{}", format_positional(&folds));
        return Ok(());
    }

    let prices = DataLoader::from_config(&config.data)
        .load_prices()
        .context("Failed to load prices")?;
    let folds = generate_folds(prices.n_rows(), train, test, step)?;
    let records: Vec<FoldRecord> = folds
        .iter()
        .filter_map(|f| FoldRecord::from_fold(f, prices.index()))
        .collect();
    println!("{}", MetricsFormatter::format_folds(&records));
    Ok(())
}

//! Dataset summary command.

use anyhow::{Context, Result};
use clap::Args;
use walkforward_core::AppConfig;
use walkforward_data::{labels_from_config, DataLoader, DataSummary, LabelDistribution};

/// Arguments for the summary command.
#[derive(Args, Debug, Clone, Default)]
pub struct SummaryArgs {
    /// Print the summaries as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Prints shape, range and missing data per dataset plus the label class balance.
///
/// # Errors
///
/// Returns an error if a dataset cannot be loaded or labels cannot be built.
pub fn run_summary(args: &SummaryArgs, config: &AppConfig) -> Result<()> {
    let loader = DataLoader::from_config(&config.data);
    let prices = loader.load_prices().context("Failed to load prices")?;
    let signals = loader.load_signals().context("Failed to load signals")?;

    let mut summaries = vec![
        DataSummary::from_table("prices", &prices),
        DataSummary::from_table("signals", &signals),
    ];
    if let Some(onchain) = loader.load_onchain()? {
        summaries.push(DataSummary::from_table("onchain", &onchain));
    }

    let labels = labels_from_config(&prices, &signals, &config.labels)?;
    let distribution = LabelDistribution::analyze(&labels);

    if args.json {
        let value = serde_json::json!({
            "datasets": summaries,
            "labels": distribution,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for summary in &summaries {
        println!("{summary}");
    }
    let o = &distribution.overall;
    println!("labels (horizon {} bars)", config.labels.horizon);
    println!(
        "  Overall:    {} labels, {} positive ({:.1}%), imbalance {:.2}",
        o.total,
        o.positive,
        o.positive_rate * 100.0,
        o.imbalance_ratio
    );
    for (asset, s) in &distribution.per_asset {
        println!(
            "  {asset:<10}  {} labels, {} positive ({:.1}%)",
            s.total,
            s.positive,
            s.positive_rate * 100.0
        );
    }
    Ok(())
}

#![allow(clippy::format_push_string)]
#![allow(clippy::uninlined_format_args)]

use crate::comparison::StrategyComparison;
use crate::folds::FoldRecord;
use crate::metrics::PerformanceMetrics;

const HEAVY_RULE: &str = "═══════════════════════════════════════════════════════════════\n";
const LIGHT_RULE: &str = "───────────────────────────────────────────────────────────────\n";

/// Plain-text rendering of backtest results for the terminal.
pub struct MetricsFormatter;

impl MetricsFormatter {
    #[must_use]
    pub fn format(title: &str, metrics: &PerformanceMetrics) -> String {
        let mut output = String::new();
        Self::banner(&mut output, title);

        output.push_str("Returns\n");
        output.push_str(LIGHT_RULE);
        output.push_str(&format!(
            "Total Return:          {:.2}%\n",
            metrics.total_return * 100.0
        ));
        output.push_str(&format!(
            "Annualized Return:     {:.2}%\n",
            metrics.annualized_return * 100.0
        ));
        output.push_str(&format!(
            "Annualized Volatility: {:.2}%\n",
            metrics.volatility_annual * 100.0
        ));
        output.push('\n');

        output.push_str("Risk-Adjusted\n");
        output.push_str(LIGHT_RULE);
        output.push_str(&format!("Sharpe Ratio:          {}\n", ratio(metrics.sharpe_ratio)));
        output.push_str(&format!("Sortino Ratio:         {}\n", ratio(metrics.sortino_ratio)));
        output.push_str(&format!("Calmar Ratio:          {}\n", ratio(metrics.calmar_ratio)));
        output.push_str(&format!(
            "Max Drawdown:          {:.2}%\n",
            metrics.max_drawdown * 100.0
        ));
        output.push('\n');

        output.push_str("Trade Statistics\n");
        output.push_str(LIGHT_RULE);
        output.push_str(&format!("Active Periods:        {}\n", metrics.n_trades));
        if metrics.n_trades > 0 {
            output.push_str(&format!(
                "Win Rate:              {:.2}%\n",
                metrics.win_rate * 100.0
            ));
            output.push_str(&format!(
                "Profit Factor:         {}\n",
                ratio(metrics.profit_factor)
            ));
        } else {
            output.push_str("Win Rate:              N/A (no trades)\n");
        }

        output.push('\n');
        output.push_str(HEAVY_RULE);

        if metrics.n_trades == 0 {
            output.push_str("\n⚠️  The strategy never held a position.\n");
            output.push_str("    Consider lowering the threshold or widening the data range.\n\n");
        }

        output
    }

    /// Baseline vs. filtered table, one line per metric.
    #[must_use]
    pub fn format_comparison(comparison: &StrategyComparison) -> String {
        let mut output = String::new();
        Self::banner(&mut output, "BASELINE vs FILTERED");

        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>12} {:>10}\n",
            "Metric", "Baseline", "Filtered", "Change", "Change %"
        ));
        output.push_str(LIGHT_RULE);
        for row in &comparison.rows {
            let pct = row
                .improvement_pct
                .map_or_else(|| "n/a".to_string(), |p| format!("{:+.1}%", p));
            output.push_str(&format!(
                "{:<20} {:>12} {:>12} {:>12} {:>10}\n",
                row.metric,
                ratio(row.baseline),
                ratio(row.candidate),
                ratio(row.improvement),
                pct
            ));
        }
        output.push('\n');
        output.push_str(HEAVY_RULE);
        output
    }

    #[must_use]
    pub fn format_folds(folds: &[FoldRecord]) -> String {
        let mut output = String::new();
        Self::banner(&mut output, "WALK-FORWARD FOLDS");

        if folds.is_empty() {
            output.push_str("No complete fold fits the data.\n\n");
            output.push_str(HEAVY_RULE);
            return output;
        }

        output.push_str(&format!(
            "{:>4}  {:<16}  {:<16}  {:<16}  {:<16}\n",
            "Fold", "Train Start", "Train End", "Test Start", "Test End"
        ));
        output.push_str(LIGHT_RULE);
        for f in folds {
            output.push_str(&format!(
                "{:>4}  {:<16}  {:<16}  {:<16}  {:<16}\n",
                f.fold,
                f.train_start.format("%Y-%m-%d %H:%M"),
                f.train_end.format("%Y-%m-%d %H:%M"),
                f.test_start.format("%Y-%m-%d %H:%M"),
                f.test_end.format("%Y-%m-%d %H:%M"),
            ));
        }
        output.push('\n');
        output.push_str(&format!("Total folds:           {}\n", folds.len()));
        output.push_str(HEAVY_RULE);
        output
    }

    fn banner(output: &mut String, title: &str) {
        output.push('\n');
        output.push_str(HEAVY_RULE);
        output.push_str(&format!("{:^63}\n", title));
        output.push_str(HEAVY_RULE);
        output.push('\n');
    }
}

fn ratio(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:.4}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::ComparisonRow;
    use chrono::{TimeZone, Utc};

    fn metrics(n_trades: usize) -> PerformanceMetrics {
        PerformanceMetrics {
            total_return: 0.125,
            annualized_return: 0.3,
            sharpe_ratio: 1.5,
            sortino_ratio: f64::INFINITY,
            max_drawdown: 0.05,
            calmar_ratio: 6.0,
            win_rate: 0.6,
            profit_factor: 2.0,
            n_trades,
            volatility_annual: 0.2,
        }
    }

    #[test]
    fn format_includes_headline_numbers() {
        let text = MetricsFormatter::format("FILTERED STRATEGY", &metrics(10));
        assert!(text.contains("FILTERED STRATEGY"));
        assert!(text.contains("Total Return:          12.50%"));
        assert!(text.contains("Sharpe Ratio:          1.5000"));
        assert!(text.contains("Sortino Ratio:         inf"));
        assert!(text.contains("Win Rate:              60.00%"));
    }

    #[test]
    fn format_warns_when_flat() {
        let text = MetricsFormatter::format("FILTERED STRATEGY", &metrics(0));
        assert!(text.contains("N/A (no trades)"));
        assert!(text.contains("never held a position"));
    }

    #[test]
    fn comparison_marks_undefined_percentage() {
        let comparison = StrategyComparison {
            baseline: metrics(4),
            candidate: metrics(2),
            rows: vec![
                ComparisonRow::new("win_rate", 0.0, 0.5),
                ComparisonRow::new("sharpe_ratio", 1.0, 1.5),
            ],
        };
        let text = MetricsFormatter::format_comparison(&comparison);
        assert!(text.contains("n/a"));
        assert!(text.contains("+50.0%"));
    }

    #[test]
    fn folds_are_listed_with_timestamps() {
        let t = |h| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();
        let folds = vec![FoldRecord {
            fold: 0,
            train_start: t(0),
            train_end: t(9),
            test_start: t(12),
            test_end: t(15),
            train_size: 4,
            test_size: 2,
        }];
        let text = MetricsFormatter::format_folds(&folds);
        assert!(text.contains("2024-01-01 12:00"));
        assert!(text.contains("Total folds:           1"));
    }

    #[test]
    fn empty_fold_list_is_explained() {
        let text = MetricsFormatter::format_folds(&[]);
        assert!(text.contains("No complete fold"));
    }
}

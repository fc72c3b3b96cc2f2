//! Side-by-side comparison of two strategies' metric sets.

use serde::{Deserialize, Serialize};
use walkforward_core::{MetricsConfig, Series};

use crate::metrics::PerformanceMetrics;

/// One metric compared between baseline and candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub metric: String,
    pub baseline: f64,
    pub candidate: f64,
    /// `candidate - baseline`.
    pub improvement: f64,
    /// `(candidate - baseline) / |baseline| * 100`; `None` when the baseline is exactly 0.
    pub improvement_pct: Option<f64>,
}

impl ComparisonRow {
    #[must_use]
    pub fn new(metric: &str, baseline: f64, candidate: f64) -> Self {
        let improvement = candidate - baseline;
        let improvement_pct = if baseline == 0.0 {
            None
        } else {
            Some(improvement / baseline.abs() * 100.0)
        };
        Self {
            metric: metric.to_string(),
            baseline,
            candidate,
            improvement,
            improvement_pct,
        }
    }
}

/// Baseline and candidate metrics with per-metric deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub baseline: PerformanceMetrics,
    pub candidate: PerformanceMetrics,
    pub rows: Vec<ComparisonRow>,
}

impl StrategyComparison {
    /// Compares two already-computed metric sets.
    #[must_use]
    pub fn from_metrics(baseline: PerformanceMetrics, candidate: PerformanceMetrics) -> Self {
        let rows = PerformanceMetrics::NAMES
            .iter()
            .filter_map(|name| {
                let b = baseline.get(name)?;
                let c = candidate.get(name)?;
                Some(ComparisonRow::new(name, b, c))
            })
            .collect();
        Self {
            baseline,
            candidate,
            rows,
        }
    }

    /// Row for a metric by name.
    #[must_use]
    pub fn row(&self, metric: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.metric == metric)
    }
}

/// Computes both metric sets and compares them.
#[must_use]
pub fn compare_strategies(
    baseline_returns: &Series,
    candidate_returns: &Series,
    config: &MetricsConfig,
) -> StrategyComparison {
    StrategyComparison::from_metrics(
        PerformanceMetrics::from_series(baseline_returns, config),
        PerformanceMetrics::from_series(candidate_returns, config),
    )
}

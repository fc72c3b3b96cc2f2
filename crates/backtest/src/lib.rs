pub mod comparison;
pub mod error;
pub mod filter;
pub mod folds;
pub mod metrics;
pub mod metrics_formatter;
pub mod returns;
pub mod walk_forward;

pub use comparison::{compare_strategies, ComparisonRow, StrategyComparison};
pub use error::BacktestError;
pub use filter::apply_filter;
pub use folds::{generate_folds, Fold, FoldRecord, FoldSchedule};
pub use metrics::{compute_all_metrics, PerformanceMetrics, DEFAULT_PERIODS_PER_YEAR};
pub use metrics_formatter::MetricsFormatter;
pub use returns::{
    compute_drawdown_series, compute_equity_curve, compute_portfolio_returns,
    compute_strategy_returns, forward_returns, StrategyReturns, PORTFOLIO_COLUMN,
};
pub use walk_forward::{
    baseline_portfolio_returns, run_walk_forward, WalkForwardOutput, WalkForwardRunner,
    PROBABILITY_COLUMN,
};

//! CLI commands for walk-forward backtesting.

pub mod folds;
pub mod run;
pub mod summary;

pub use folds::{run_folds, FoldsArgs};
pub use run::{run_walk_forward, RunArgs};
pub use summary::{run_summary, SummaryArgs};

use std::path::Path;
use std::process::Command;

use chrono::{Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;
use walkforward_backtest::{
    baseline_portfolio_returns, compare_strategies, PerformanceMetrics, WalkForwardRunner,
};
use walkforward_core::{ConfigLoader, TimeSeriesTable, Timestamp};
use walkforward_data::{
    build_feature_matrix, labels_from_config, pooled_label, write_csv_table, DataLoader,
    LABEL_COLUMN,
};
use walkforward_model::LogisticTrainer;

const PERIODS: usize = 400;

fn index(n: usize) -> Vec<Timestamp> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n).map(|i| start + Duration::hours(3 * i as i64)).collect()
}

/// Random-walk prices for two assets and a 4-bar momentum signal on each.
fn synthetic_tables(n: usize, seed: u64) -> (TimeSeriesTable, TimeSeriesTable) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut price_cols = Vec::new();
    let mut signal_cols = Vec::new();
    for asset in ["BTC", "ETH"] {
        let mut p = 100.0;
        let prices: Vec<f64> = (0..n)
            .map(|_| {
                p *= 1.0 + rng.gen_range(-0.02..0.021);
                p
            })
            .collect();
        let signals = (0..n)
            .map(|t| Some(if t >= 4 && prices[t] > prices[t - 4] { 1.0 } else { 0.0 }))
            .collect();
        price_cols.push((asset.to_string(), prices.into_iter().map(Some).collect()));
        signal_cols.push((asset.to_string(), signals));
    }
    (
        TimeSeriesTable::new(index(n), price_cols).unwrap(),
        TimeSeriesTable::new(index(n), signal_cols).unwrap(),
    )
}

/// Writes the datasets and a Config.toml with small windows into `dir`.
fn write_fixture(dir: &Path, periods: usize) {
    let (prices, signals) = synthetic_tables(periods, 42);
    write_csv_table(&dir.join("price_data.csv"), &prices).unwrap();
    write_csv_table(&dir.join("trade_log.csv"), &signals).unwrap();

    let config = format!(
        r#"
[data]
data_dir = {:?}

[walk_forward]
train_size = 120
test_size = 40
transaction_cost = 0.001
threshold = 0.5

[features]
return_windows = [1, 4]
volatility_windows = [8]
ma_windows = [8]
rsi_window = 8
bollinger_window = 10
momentum_windows = [4]
onchain_metrics = []

[labels]
horizon = 2
"#,
        dir.display().to_string()
    );
    std::fs::write(dir.join("Config.toml"), config).unwrap();
}

fn walkforward(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_walkforward"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to launch walkforward binary")
}

// ============================================================
// Library pipeline
// ============================================================

#[test]
fn test_pipeline_produces_out_of_sample_results() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), PERIODS);
    let config = ConfigLoader::new(dir.path()).load().unwrap();

    let loader = DataLoader::from_config(&config.data);
    let prices = loader.load_prices().unwrap();
    let signals = loader.load_signals().unwrap();

    let features = build_feature_matrix(&prices, &signals, None, &config.features).unwrap();
    let labels = labels_from_config(&prices, &signals, &config.labels).unwrap();
    let pooled = pooled_label(&labels).unwrap();
    let labels = TimeSeriesTable::broadcast(&pooled, &[LABEL_COLUMN.to_string()]);

    let trainer = LogisticTrainer::from_config(&config.model);
    let runner = WalkForwardRunner::new(config.walk_forward.clone());
    let output = runner
        .run(&signals, &prices, &trainer, &features, &labels)
        .unwrap();

    // (400 - 120 - 40) / 40 + 1
    assert_eq!(output.folds.len(), 7);
    assert_eq!(output.scored_index().len(), 7 * 40);
    assert_eq!(output.scored_index()[0], prices.index()[120]);
    assert!(output
        .probabilities
        .values()
        .iter()
        .all(|p| p.is_some_and(|p| (0.0..=1.0).contains(&p))));

    // Filtering can only remove exposure
    let baseline_signals = signals.reindex(output.scored_index()).unwrap();
    for c in 0..baseline_signals.n_columns() {
        let kept = output.filtered_signals.column_at(c);
        for (f, b) in kept.iter().zip(baseline_signals.column_at(c)) {
            assert!(f.unwrap() <= b.unwrap());
        }
    }

    let baseline = baseline_portfolio_returns(
        &signals,
        &prices,
        output.scored_index(),
        config.walk_forward.transaction_cost,
    )
    .unwrap();
    let comparison = compare_strategies(&baseline, &output.portfolio_returns, &config.metrics);
    assert_eq!(comparison.rows.len(), PerformanceMetrics::NAMES.len());
}

#[test]
fn test_pipeline_is_repeatable() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), 250);
    let config = ConfigLoader::new(dir.path()).load().unwrap();

    let run = || {
        let loader = DataLoader::from_config(&config.data);
        let prices = loader.load_prices().unwrap();
        let signals = loader.load_signals().unwrap();
        let features = build_feature_matrix(&prices, &signals, None, &config.features).unwrap();
        let pooled = pooled_label(&labels_from_config(&prices, &signals, &config.labels).unwrap())
            .unwrap();
        let labels = TimeSeriesTable::broadcast(&pooled, &[LABEL_COLUMN.to_string()]);
        WalkForwardRunner::new(config.walk_forward.clone())
            .run(
                &signals,
                &prices,
                &LogisticTrainer::from_config(&config.model),
                &features,
                &labels,
            )
            .unwrap()
    };

    assert_eq!(run(), run());
}

// ============================================================
// Binary
// ============================================================

#[test]
fn test_cli_folds_for_explicit_period_count() {
    let out = walkforward(&[
        "folds",
        "--periods",
        "10",
        "--train-size",
        "5",
        "--test-size",
        "2",
        "--step-size",
        "2",
    ]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Total folds: 2"));
}

#[test]
fn test_cli_run_writes_report_and_signals() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), PERIODS);
    let report = dir.path().join("report.json");
    let filtered = dir.path().join("filtered.csv");

    let out = walkforward(&[
        "--config-dir",
        dir.path().to_str().unwrap(),
        "run",
        "--output",
        report.to_str().unwrap(),
        "--signals-out",
        filtered.to_str().unwrap(),
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("BASELINE vs FILTERED"));
    assert!(stdout.contains("WALK-FORWARD FOLDS"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["folds"].as_array().unwrap().len(), 7);
    assert_eq!(json["scored_periods"], 280);
    assert_eq!(json["comparison"]["rows"].as_array().unwrap().len(), 10);
    assert_eq!(json["label_horizon"], 2);
    assert_eq!(json["labels_overlap_test"], true);

    let signals = walkforward_data::read_csv_table(&filtered).unwrap();
    assert_eq!(signals.n_rows(), 280);
    assert_eq!(signals.columns(), &["BTC".to_string(), "ETH".to_string()]);
}

#[test]
fn test_cli_run_with_purge_matching_horizon() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), PERIODS);
    let report = dir.path().join("report.json");

    let out = walkforward(&[
        "--config-dir",
        dir.path().to_str().unwrap(),
        "run",
        "--purge",
        "2",
        "--output",
        report.to_str().unwrap(),
    ]);
    assert!(out.status.success());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["walk_forward"]["purge"], 2);
    assert_eq!(json["labels_overlap_test"], false);
    assert_eq!(json["scored_periods"], 280);
}

#[test]
fn test_cli_run_with_too_little_data_reports_no_folds() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), 100);
    let report = dir.path().join("report.json");

    let out = walkforward(&[
        "--config-dir",
        dir.path().to_str().unwrap(),
        "run",
        "--output",
        report.to_str().unwrap(),
    ]);
    assert!(out.status.success());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert!(json["folds"].as_array().unwrap().is_empty());
    assert_eq!(json["scored_periods"], 0);
}

#[test]
fn test_cli_rejects_invalid_threshold() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), 200);

    let out = walkforward(&[
        "--config-dir",
        dir.path().to_str().unwrap(),
        "run",
        "--threshold",
        "1.5",
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("threshold"));
}

#[test]
fn test_cli_summary_as_json() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), 120);

    let out = walkforward(&[
        "--config-dir",
        dir.path().to_str().unwrap(),
        "summary",
        "--json",
    ]);
    assert!(out.status.success());

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["datasets"][0]["name"], "prices");
    assert_eq!(json["datasets"][0]["rows"], 120);
    assert!(json["labels"]["overall"]["total"].as_u64().unwrap() > 0);
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use walkforward_core::{AppConfig, ConfigLoader};

mod commands;

use commands::{FoldsArgs, RunArgs, SummaryArgs};

#[derive(Parser)]
#[command(name = "walkforward")]
#[command(about = "Walk-forward backtesting of probability-filtered trading signals", long_about = None)]
struct Cli {
    /// Directory holding Config.toml
    #[arg(short, long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Configuration profile, loads Config.{profile}.toml on top of Config.toml
    #[arg(long, env = "WF_PROFILE", global = true)]
    profile: Option<String>,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the baseline and filtered strategies and compare them
    Run(RunArgs),
    /// Print the walk-forward fold schedule
    Folds(FoldsArgs),
    /// Summarize the datasets and label balance
    Summary(SummaryArgs),
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let loader = ConfigLoader::new(&cli.config_dir);
    let config = match &cli.profile {
        Some(profile) => loader.load_with_profile(profile)?,
        None => loader.load()?,
    };
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let config = load_config(&cli)?;
    tracing::debug!(?config, "Loaded configuration");

    match &cli.command {
        Commands::Run(args) => commands::run_walk_forward(args, config)?,
        Commands::Folds(args) => commands::run_folds(args, &config)?,
        Commands::Summary(args) => commands::run_summary(args, &config)?,
    }

    Ok(())
}

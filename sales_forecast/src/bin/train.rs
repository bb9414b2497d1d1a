//! # train
//!
//! Runs the sales training pipeline end to end and promotes its artifacts.

use clap::Parser;
use sales_forecast::{RunOutcome, TrainingConfig, TrainingOrchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train the sales forecasting model", long_about = None)]
struct Cli {
    /// JSON configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the raw CSV tables
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for merged tables, feature tables and the submission
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Root of the artifact store
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Year held out for evaluation
    #[arg(long)]
    validation_year: Option<i32>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => match TrainingConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "invalid configuration");
                return ExitCode::FAILURE;
            }
        },
        None => TrainingConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = cli.artifact_dir {
        config.artifact_dir = dir;
    }
    if let Some(year) = cli.validation_year {
        config.validation_year = year;
    }

    match TrainingOrchestrator::new(config).run() {
        RunOutcome::Completed(report) => {
            println!("Run {} completed ({})", report.run_id, report.model_name);
            println!("{}", report.metrics);
            println!("Artifacts: {}", report.run_dir.display());
            println!("Submission: {}", report.submission_path.display());
            ExitCode::SUCCESS
        }
        RunOutcome::Failed { stage, cause } => {
            eprintln!("Training failed at stage {}: {}", stage, cause);
            ExitCode::FAILURE
        }
    }
}

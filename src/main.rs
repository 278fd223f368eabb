use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use thermal_wind::api::{CorrectionKind, TaskResponse, TaskService};
use thermal_wind::config::Config;
use thermal_wind::domain::StationObservation;
use thermal_wind::forecast::OpenMeteoClient;
use thermal_wind::repo::Repositories;
use thermal_wind::telemetry::init_tracing;
use tracing::info;

#[derive(Parser)]
#[command(name = "thermal-wind")]
#[command(about = "Thermal wind forecasting with a self-correcting model", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrain the correction model from forecast and observed history
    TrainCorrection {
        #[arg(short, long, value_enum, default_value_t = CorrectionKind::Ridge)]
        kind: CorrectionKind,
    },
    /// Retrain the monthly peak-time model
    TrainPeakTime,
    /// Score and predict a date range, recording it in the forecast history
    Predict {
        /// First date (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date (defaults to start plus --days)
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value_t = 2)]
        days: i64,
    },
    /// Reduce raw station samples to daily maxima and merge them into history
    Ingest {
        /// JSON array of station samples
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Remove the most recent observed day from the real wind history
    DeleteLastRealWind,
    /// Ingest (optional), retrain correction, retrain peak time
    Nightly {
        #[arg(long, value_name = "FILE")]
        observations: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = CorrectionKind::Ridge)]
        kind: CorrectionKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = Config::load(cli.config.as_deref())?;
    let repos = Repositories::new(&cfg);
    let provider = Arc::new(OpenMeteoClient::new(cfg.weather.clone())?);
    let service = TaskService::new(&cfg, repos, provider)?;

    info!(data_dir = %cfg.store.data_dir.display(), "thermal-wind starting");

    let success = match cli.command {
        Commands::TrainCorrection { kind } => emit(&service.train_correction_model(kind).await)?,
        Commands::TrainPeakTime => emit(&service.train_peak_time_model().await)?,
        Commands::Predict { start, end, days } => {
            let start = start.unwrap_or_else(|| Local::now().date_naive());
            let end = end.unwrap_or(start + Duration::days(days));
            emit(&service.score_and_predict(start, end).await)?
        }
        Commands::Ingest { file } => {
            let observations = read_observations(&file).await?;
            emit(&service.ingest_observations(observations).await)?
        }
        Commands::DeleteLastRealWind => emit(&service.delete_last_real_wind().await)?,
        Commands::Nightly { observations, kind } => {
            let observations = match observations {
                Some(path) => Some(read_observations(&path).await?),
                None => None,
            };
            let service = service.with_correction_kind(kind);
            emit(&service.run_nightly(observations).await)?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn emit<T: Serialize>(response: &TaskResponse<T>) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(response.success)
}

async fn read_observations(path: &Path) -> Result<Vec<StationObservation>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid observations in {}", path.display()))
}

mod cli;
mod format;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use hindcast_core::Config;
use hindcast_history::{HistoryError, ReferenceDay, WeatherHistory};
use hindcast_weather::Coordinates;
use serde_json::Value;

use crate::cli::{Cli, Commands, OutputFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<HistoryError>() {
            Some(history) => {
                eprintln!("{}", history.user_message());
                tracing::debug!("{:#}", e);
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    hindcast_core::init(if cli.verbose { "debug" } else { "info" })?;

    let (config, _) = Config::load_validated().context("Failed to load configuration")?;
    let history = WeatherHistory::from_config(&config)?;
    let format = cli.format;

    match cli.command {
        Commands::Lookup { place } => {
            let report = history.lookup(&place).await?;
            emit(format, format::lookup_json(&report), || format::lookup_text(&report))
        }
        Commands::Here { lat, lon, name } => {
            let coordinates = Coordinates::new(lat, lon);
            let report = match name {
                Some(name) => history.lookup_at(&name, coordinates).await?,
                None => history.lookup_here(coordinates).await?,
            };
            emit(format, format::lookup_json(&report), || format::lookup_text(&report))
        }
        Commands::Sync {
            location,
            lat,
            lon,
            start,
            end,
        } => {
            let coordinates = Coordinates::new(lat, lon);
            let coordinator = history.coordinator();
            let report = match (start, end) {
                (Some(start), Some(end)) => {
                    coordinator.sync_range(&location, coordinates, start, end).await?
                }
                _ => coordinator.sync(&location, coordinates).await?,
            };
            emit(format, serde_json::to_value(&report)?, || {
                format!("{}\n", format::sync_text(&report))
            })
        }
        Commands::Series { location, last } => {
            let mut points = history.projector().project(&location).await?;
            if let Some(n) = last {
                points = points.split_off(points.len().saturating_sub(n));
            }
            emit(format, serde_json::to_value(&points)?, || format::series_text(&points))
        }
        Commands::Anomaly {
            location,
            current,
            date,
            years,
        } => {
            let mut engine = history.anomaly_engine().clone();
            if let Some(years) = years {
                engine = engine.with_years(years);
            }
            let day = date.unwrap_or_else(|| ReferenceDay::from(Local::now().date_naive()));
            let result = engine.compute(&location, day, current).await;
            emit(format, format::anomaly_json(&result), || {
                format!("{} on {}: {}\n", location, day, format::anomaly_text(&result))
            })
        }
        Commands::Locations => {
            let store = history.store();
            let mut rows = Vec::new();
            for location in store.locations().await? {
                let days = store.count_for_location(&location).await?;
                let span = store.date_span(&location).await?;
                rows.push((location, days, span));
            }
            emit(format, format::locations_json(&rows), || format::locations_text(&rows))
        }
    }
}

fn emit(format: OutputFormat, json: Value, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json)?),
        OutputFormat::Text => print!("{}", text()),
    }
    Ok(())
}

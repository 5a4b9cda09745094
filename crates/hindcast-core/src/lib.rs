pub mod config;
pub mod error;

pub use config::{
    AnomalyConfig, Config, SyncConfig, ValidationResult, WeatherConfig, MAX_INGESTION_LAG_DAYS,
    MAX_SPAN_YEARS,
};
pub use error::{ConfigError, DatabaseError, NetworkError, ReqwestErrorExt, RusqliteErrorExt};

use anyhow::Result;

/// Initialize tracing for a Hindcast process.
///
/// `default_filter` is used when `RUST_LOG` is not set.
pub fn init(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::debug!("Hindcast core initialized");
    Ok(())
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the weather history database
    pub data_dir: PathBuf,

    /// Remote endpoints and HTTP behaviour
    pub weather: WeatherConfig,

    /// Historical range synchronization
    pub sync: SyncConfig,

    /// Same-day average comparison
    pub anomaly: AnomalyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Open-Meteo forecast endpoint (current conditions)
    pub forecast_url: String,

    /// Open-Meteo archive endpoint (daily history)
    pub archive_url: String,

    /// Nominatim base URL used for place search and reverse lookups
    pub geocoding_url: String,

    /// User-Agent sent with every request (Nominatim requires one)
    pub user_agent: String,

    /// Upper bound for a single HTTP request
    pub request_timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            geocoding_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("Hindcast/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Largest year span accepted for `sync.history_years` and `anomaly.years`.
pub const MAX_SPAN_YEARS: u32 = 100;

/// Largest accepted `sync.ingestion_lag_days`.
pub const MAX_INGESTION_LAG_DAYS: u32 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How many years of daily history a default sync covers
    pub history_years: u32,

    /// Trailing days the archive has not published yet
    pub ingestion_lag_days: u32,

    /// Records per storage transaction
    pub batch_size: usize,

    /// Retries for transient archive failures
    pub max_retries: u32,

    /// First retry delay, doubled per attempt
    pub initial_retry_delay_ms: u64,

    /// Cap on the retry delay
    pub max_retry_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            history_years: 10,
            ingestion_lag_days: 10,
            batch_size: 365,
            max_retries: 3,
            initial_retry_delay_ms: 200,
            max_retry_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Number of previous years averaged for the same calendar day
    pub years: u32,

    /// Fewer found years than this is reported as insufficient history
    pub min_years: u32,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            years: 10,
            min_years: 1,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hindcast")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            weather: WeatherConfig::default(),
            sync: SyncConfig::default(),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse config file: {}", e)))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.forecast_url, "weather.forecast_url", &mut result);
        self.validate_url(&self.weather.archive_url, "weather.archive_url", &mut result);
        self.validate_url(&self.weather.geocoding_url, "weather.geocoding_url", &mut result);

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.weather.request_timeout_secs > 300 {
            result.add_warning(
                "weather.request_timeout_secs",
                "Request timeout is more than 5 minutes",
            );
        }

        if self.weather.user_agent.trim().is_empty() {
            result.add_warning(
                "weather.user_agent",
                "Empty User-Agent; the geocoding service may reject requests",
            );
        }

        if self.sync.history_years == 0 {
            result.add_error("sync.history_years", "History span must be at least one year");
        } else if self.sync.history_years > MAX_SPAN_YEARS {
            result.add_error(
                "sync.history_years",
                format!("History span must be at most {} years", MAX_SPAN_YEARS),
            );
        }

        if self.sync.batch_size == 0 {
            result.add_error("sync.batch_size", "Batch size must be greater than 0");
        }

        if self.sync.ingestion_lag_days > MAX_INGESTION_LAG_DAYS {
            result.add_error(
                "sync.ingestion_lag_days",
                format!("Ingestion lag must be at most {} days", MAX_INGESTION_LAG_DAYS),
            );
        } else if self.sync.ingestion_lag_days < 5 {
            result.add_warning(
                "sync.ingestion_lag_days",
                "The archive usually lags several days; recent days may be missing",
            );
        }

        if self.sync.initial_retry_delay_ms > self.sync.max_retry_delay_ms {
            result.add_warning(
                "sync.initial_retry_delay_ms",
                "Initial retry delay exceeds the maximum delay",
            );
        }

        if self.anomaly.years == 0 {
            result.add_error("anomaly.years", "Anomaly span must be at least one year");
        } else if self.anomaly.years > MAX_SPAN_YEARS {
            result.add_error(
                "anomaly.years",
                format!("Anomaly span must be at most {} years", MAX_SPAN_YEARS),
            );
        }

        if self.anomaly.min_years > self.anomaly.years {
            result.add_error(
                "anomaly.min_years",
                format!(
                    "Minimum years ({}) exceeds the span ({})",
                    self.anomaly.min_years, self.anomaly.years
                ),
            );
        } else if self.anomaly.min_years == 0 {
            result.add_warning(
                "anomaly.min_years",
                "Minimum of 0 years; an empty history is reported as insufficient anyway",
            );
        }

        if self.data_dir.exists() && !self.data_dir.is_dir() {
            result.add_error(
                "data_dir",
                format!("Path is not a directory: {}", self.data_dir.display()),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Io(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(format!("Failed to write config file: {}", e)))
    }

    /// Path of the SQLite weather history database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("weather_history.db")
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".to_string()))?
            .join("hindcast");

        Ok(config_dir.join("config.toml"))
    }
}

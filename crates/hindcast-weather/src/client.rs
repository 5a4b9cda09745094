//! Open-Meteo forecast and archive client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use hindcast_core::{NetworkError, ReqwestErrorExt, WeatherConfig};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;
use crate::types::{Coordinates, CurrentReading, DailySeries, DATE_FORMAT};

const CURRENT_FIELDS: &str = "temperature_2m,is_day";
const FORECAST_DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min";
const ARCHIVE_DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,temperature_2m_mean";

/// Source of current and historical daily temperatures.
///
/// Implementations never retry; that is the caller's decision.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current temperature plus today's min/max for `coordinates`.
    async fn fetch_current(&self, coordinates: Coordinates)
        -> Result<CurrentReading, WeatherError>;

    /// Daily mean/min/max temperatures for `[start, end]`, inclusive.
    ///
    /// # Errors
    /// Returns `WeatherError::Decode` for any malformed or incomplete
    /// response; a partial series is never returned.
    async fn fetch_range(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries, WeatherError>;
}

/// HTTP client for the Open-Meteo forecast and archive endpoints.
///
/// Holds one long-lived `reqwest::Client` with a bounded timeout.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Arc<Client>,
    forecast_url: String,
    archive_url: String,
}

impl OpenMeteoClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::with_endpoints(
            &config.forecast_url,
            &config.archive_url,
            &config.user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_endpoints(
        forecast_url: &str,
        archive_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client: Arc::new(client),
            forecast_url: forecast_url.trim_end_matches('/').to_string(),
            archive_url: archive_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        if !status.is_success() {
            // Open-Meteo reports bad parameters as {"error": true, "reason": "..."}
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.reason)
                .unwrap_or(body);
            tracing::debug!("Weather API returned status {}: {}", status, message);
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        serde_json::from_str(&body)
            .map_err(|e| WeatherError::decode(format!("Unexpected response shape: {}", e)))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    #[instrument(skip(self), level = "info")]
    async fn fetch_current(
        &self,
        coordinates: Coordinates,
    ) -> Result<CurrentReading, WeatherError> {
        let query = [
            ("latitude", coordinates.latitude.to_string()),
            ("longitude", coordinates.longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("daily", FORECAST_DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", "1".to_string()),
        ];

        let body: ForecastResponse = self.get_json(&self.forecast_url, &query).await?;
        body.into_reading()
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_range(
        &self,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries, WeatherError> {
        let query = [
            ("latitude", coordinates.latitude.to_string()),
            ("longitude", coordinates.longitude.to_string()),
            ("start_date", start.format(DATE_FORMAT).to_string()),
            ("end_date", end.format(DATE_FORMAT).to_string()),
            ("daily", ARCHIVE_DAILY_FIELDS.to_string()),
            ("timezone", "auto".to_string()),
        ];

        let body: ArchiveResponse = self.get_json(&self.archive_url, &query).await?;
        let series = body.daily.into_series()?;
        tracing::debug!("Decoded {} daily rows from archive", series.len());
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: ForecastCurrent,
    daily: ForecastDaily,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    temperature_2m: f64,
    is_day: u8,
}

#[derive(Debug, Deserialize)]
struct ForecastDaily {
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
}

impl ForecastResponse {
    fn into_reading(self) -> Result<CurrentReading, WeatherError> {
        let day_max = self
            .daily
            .temperature_2m_max
            .first()
            .copied()
            .flatten()
            .ok_or_else(|| WeatherError::decode("Forecast has no temperature_2m_max for today"))?;
        let day_min = self
            .daily
            .temperature_2m_min
            .first()
            .copied()
            .flatten()
            .ok_or_else(|| WeatherError::decode("Forecast has no temperature_2m_min for today"))?;

        Ok(CurrentReading {
            temperature: self.current.temperature_2m,
            is_day: self.current.is_day != 0,
            day_min,
            day_max,
            fetched_at: Utc::now(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    time: Vec<String>,
    temperature_2m_mean: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
}

impl ArchiveDaily {
    fn into_series(self) -> Result<DailySeries, WeatherError> {
        let dates = self
            .time
            .iter()
            .map(|t| {
                NaiveDate::parse_from_str(t, DATE_FORMAT)
                    .map_err(|e| WeatherError::decode(format!("Invalid date '{}': {}", t, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(WeatherError::decode("Archive dates are not strictly ascending"));
        }

        let mean = complete("temperature_2m_mean", self.temperature_2m_mean, &dates)?;
        let min = complete("temperature_2m_min", self.temperature_2m_min, &dates)?;
        let max = complete("temperature_2m_max", self.temperature_2m_max, &dates)?;

        DailySeries::new(dates, mean, min, max)
            .ok_or_else(|| WeatherError::decode("Daily arrays have different lengths"))
    }
}

/// Every requested day must carry a value; a gap fails the whole series.
fn complete(
    field: &str,
    values: Vec<Option<f64>>,
    dates: &[NaiveDate],
) -> Result<Vec<f64>, WeatherError> {
    if values.len() != dates.len() {
        return Err(WeatherError::decode(format!(
            "{} has {} values for {} dates",
            field,
            values.len(),
            dates.len()
        )));
    }

    values
        .into_iter()
        .zip(dates)
        .map(|(value, date)| {
            value.ok_or_else(|| WeatherError::decode(format!("{} is null on {}", field, date)))
        })
        .collect()
}

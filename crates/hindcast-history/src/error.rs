//! Error types for the history pipeline.

use chrono::NaiveDate;
use hindcast_core::NetworkError;
use hindcast_store::{BatchError, StoreError};
use hindcast_weather::WeatherError;
use thiserror::Error;

/// Errors from syncing, projecting or comparing historical weather.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Transport failure, timeout or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The weather service answered with data that could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The geocoder found no match for a place name.
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    /// Empty location key, or coordinates that cannot be queried.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A year or day span is outside the supported bounds.
    #[error("Invalid {what}: {value} (allowed 1 to {max})")]
    InvalidSpan {
        what: &'static str,
        value: u32,
        max: u32,
    },

    /// The current reading is not a finite temperature.
    #[error("Invalid temperature reading: {0}")]
    InvalidReading(f64),

    /// A batch write stopped partway. `applied` records stay committed.
    ///
    /// When the writing task itself panicked or was cancelled, `applied` is
    /// 0 and only a lower bound; query the store for the committed count.
    #[error("Sync incomplete: stored {applied} of {expected} days: {source}")]
    SyncIncomplete {
        applied: usize,
        expected: usize,
        #[source]
        source: StoreError,
    },

    /// Fewer past years had data for the reference day than required.
    #[error("Insufficient history: found {found} of {required} required years")]
    InsufficientHistory { found: usize, required: usize },

    /// The historical average is zero, so a percent deviation is undefined.
    #[error("Historical average {average} is too close to zero for a percent deviation")]
    DegenerateAverage { average: f64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<WeatherError> for HistoryError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::Network(e) => Self::Network(e),
            WeatherError::Decode(msg) => Self::Decode(msg),
            WeatherError::LocationNotFound(place) => Self::LocationNotFound(place),
        }
    }
}

impl HistoryError {
    pub(crate) fn incomplete(err: BatchError, expected: usize) -> Self {
        Self::SyncIncomplete {
            applied: err.applied,
            expected,
            source: err.source,
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Decode(_) => "Weather service returned unexpected data. Please try again later.",
            Self::LocationNotFound(_) => "Location not found. Check the spelling and try again.",
            Self::InvalidLocation(_) => "Enter a place name or allow location access.",
            Self::InvalidRange { .. } => "The start date must not be after the end date.",
            Self::InvalidSpan { .. } => "The requested span of history is out of range.",
            Self::InvalidReading(_) => "The current temperature is unavailable.",
            Self::SyncIncomplete { .. } => {
                "Only part of the weather history was saved. Search again to finish."
            }
            Self::InsufficientHistory { .. } => {
                "Not enough past data for this day to compare against yet."
            }
            Self::DegenerateAverage { .. } => {
                "The historical average is 0°, so a percentage change can't be shown."
            }
            Self::Storage(e) => e.user_message(),
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::SyncIncomplete { .. } => true,
            _ => false,
        }
    }
}

//! Weather-source error types.

use hindcast_core::NetworkError;
use thiserror::Error;

/// Weather provider errors
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Transport failure, timeout or non-success HTTP status.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The response body did not match the expected schema.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The geocoder found no match for a place name.
    #[error("Location not found: {0}")]
    LocationNotFound(String),
}

impl WeatherError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Decode(_) => "Weather service returned unexpected data. Please try again later.",
            Self::LocationNotFound(_) => "Location not found. Check the spelling and try again.",
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Decode(_) | Self::LocationNotFound(_) => false,
        }
    }
}

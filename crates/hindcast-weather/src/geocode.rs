//! Geocoding: place names to coordinates and back.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.

use std::time::Duration;

use async_trait::async_trait;
use hindcast_core::{NetworkError, ReqwestErrorExt, WeatherConfig};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;
use crate::types::Coordinates;

/// Resolves free-text place names to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Best match for `place`.
    ///
    /// # Errors
    /// Returns `WeatherError::LocationNotFound` when nothing matches.
    async fn resolve(&self, place: &str) -> Result<Coordinates, WeatherError>;

    /// Human-readable name for `coordinates` (e.g. "Seattle, Washington").
    ///
    /// `Ok(None)` means the service answered but had no address there.
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state_district: Option<String>,
    state: Option<String>,
    county: Option<String>,
    country: Option<String>,
}

impl NominatimAddress {
    /// Prefer city > town > village > municipality, with state or country
    /// appended for disambiguation when it differs from the place.
    fn display(self) -> Option<String> {
        let state = self.state.clone();
        let country = self.country.clone();

        let place = self
            .city
            .or(self.town)
            .or(self.village)
            .or(self.municipality)
            .or(self.state_district)
            .or(self.county)
            .or(self.state)
            .or(self.country)?;

        let suffix = state
            .filter(|s| !s.is_empty() && *s != place)
            .or_else(|| country.filter(|c| !c.is_empty() && *c != place));

        Some(match suffix {
            Some(s) => format!("{}, {}", place, s),
            None => place,
        })
    }
}

/// Nominatim-backed [`Geocoder`] with one long-lived HTTP client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::with_base_url(
            &config.geocoding_url,
            &config.user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String, WeatherError> {
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
            tracing::debug!("Geocoder returned status {}", status);
            return Err(NetworkError::ServerError {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        Ok(body)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self), level = "info")]
    async fn resolve(&self, place: &str) -> Result<Coordinates, WeatherError> {
        let trimmed = place.trim();
        if trimmed.is_empty() {
            return Err(WeatherError::LocationNotFound(place.to_string()));
        }

        let query = [
            ("q", trimmed.to_string()),
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        let body = self.get(&format!("{}/search", self.base_url), &query).await?;

        let places: Vec<NominatimPlace> = serde_json::from_str(&body)
            .map_err(|e| WeatherError::decode(format!("Unexpected geocoder response: {}", e)))?;

        let best = places
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::LocationNotFound(trimmed.to_string()))?;

        let latitude: f64 = best
            .lat
            .parse()
            .map_err(|_| WeatherError::decode(format!("Invalid latitude '{}'", best.lat)))?;
        let longitude: f64 = best
            .lon
            .parse()
            .map_err(|_| WeatherError::decode(format!("Invalid longitude '{}'", best.lon)))?;

        let coordinates = Coordinates::new(latitude, longitude);
        tracing::info!("Resolved '{}' to {}", trimmed, coordinates);
        Ok(coordinates)
    }

    #[instrument(skip(self), level = "info")]
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>, WeatherError> {
        let query = [
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("format", "json".to_string()),
            ("addressdetails", "1".to_string()),
            ("layer", "address".to_string()),
            ("zoom", "10".to_string()),
        ];
        let body = self.get(&format!("{}/reverse", self.base_url), &query).await?;

        let parsed: NominatimResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::decode(format!("Unexpected geocoder response: {}", e)))?;

        let name = parsed.address.and_then(NominatimAddress::display);
        if let Some(ref n) = name {
            tracing::info!("Reverse geocoded to: {}", n);
        }
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(server: &MockServer) -> NominatimGeocoder {
        NominatimGeocoder::with_base_url(&server.uri(), "hindcast-test", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_first_match() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Paris"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "48.8588897", "lon": "2.3200410", "display_name": "Paris, France"}
            ])))
            .mount(&mock_server)
            .await;

        let coords = geocoder_for(&mock_server).resolve("  Paris ").await.unwrap();
        assert!((coords.latitude - 48.8588897).abs() < 1e-9);
        assert!((coords.longitude - 2.3200410).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_resolve_no_match() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let result = geocoder_for(&mock_server).resolve("Atlantis").await;
        assert!(matches!(result, Err(WeatherError::LocationNotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_blank_place_skips_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let result = geocoder_for(&mock_server).resolve("   ").await;
        assert!(matches!(result, Err(WeatherError::LocationNotFound(_))));
    }

    #[tokio::test]
    async fn test_reverse_prefers_city_with_state() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("zoom", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "display_name": "Seattle, King County, Washington, United States",
                "address": {
                    "city": "Seattle",
                    "county": "King County",
                    "state": "Washington",
                    "country": "United States"
                }
            })))
            .mount(&mock_server)
            .await;

        let name = geocoder_for(&mock_server)
            .reverse(Coordinates::new(47.6062, -122.3321))
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Seattle, Washington"));
    }

    #[test]
    fn test_address_falls_back_to_country_suffix() {
        let address = NominatimAddress {
            city: None,
            town: Some("Hallstatt".into()),
            village: None,
            municipality: None,
            state_district: None,
            state: None,
            county: None,
            country: Some("Austria".into()),
        };
        assert_eq!(address.display().as_deref(), Some("Hallstatt, Austria"));
    }

    #[test]
    fn test_address_without_suffix_when_place_is_state() {
        let address = NominatimAddress {
            city: None,
            town: None,
            village: None,
            municipality: None,
            state_district: None,
            state: Some("Bavaria".into()),
            county: None,
            country: None,
        };
        assert_eq!(address.display().as_deref(), Some("Bavaria"));
    }
}

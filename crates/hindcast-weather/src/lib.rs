//! Weather data for Hindcast
//!
//! Provides current conditions and daily history via the Open-Meteo
//! forecast and archive APIs, plus place-name geocoding via Nominatim.

pub mod client;
pub mod error;
pub mod geocode;
pub mod types;

pub use client::{OpenMeteoClient, WeatherSource};
pub use error::WeatherError;
pub use geocode::{Geocoder, NominatimGeocoder};
pub use types::*;

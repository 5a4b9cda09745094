//! Stored record types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar day's temperatures for one location.
///
/// `(location, date)` is unique in the store. `location` is the raw
/// user-entered key and is not normalized: "Paris" and "paris " are
/// different locations and keep separate histories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub location: String,
    pub date: NaiveDate,
    /// Degrees Celsius
    pub mean_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

impl DailyRecord {
    pub fn new(
        location: impl Into<String>,
        date: NaiveDate,
        mean_temp: f64,
        min_temp: f64,
        max_temp: f64,
    ) -> Self {
        Self {
            location: location.into(),
            date,
            mean_temp,
            min_temp,
            max_temp,
        }
    }
}

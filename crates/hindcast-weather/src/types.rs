use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Date format used by the archive API and the history store.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `(0, 0)` is what a failed geocode produced historically; it is never a real query.
    pub fn is_sentinel(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Finite, within WGS84 bounds, and not the sentinel.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && !self.is_sentinel()
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Current conditions from the forecast endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentReading {
    pub temperature: f64,
    pub is_day: bool,
    pub day_min: f64,
    pub day_max: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Daily temperatures for a date range, index-aligned by date.
///
/// Only constructed through [`DailySeries::new`], which rejects arrays of
/// different lengths, so every index is a complete day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    mean_temps: Vec<f64>,
    min_temps: Vec<f64>,
    max_temps: Vec<f64>,
}

/// One aligned row of a [`DailySeries`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyValues {
    pub date: NaiveDate,
    pub mean_temp: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

impl DailySeries {
    /// Build a series, or `None` if the arrays are not the same length.
    pub fn new(
        dates: Vec<NaiveDate>,
        mean_temps: Vec<f64>,
        min_temps: Vec<f64>,
        max_temps: Vec<f64>,
    ) -> Option<Self> {
        let len = dates.len();
        if mean_temps.len() != len || min_temps.len() != len || max_temps.len() != len {
            return None;
        }
        Some(Self {
            dates,
            mean_temps,
            min_temps,
            max_temps,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn mean_temps(&self) -> &[f64] {
        &self.mean_temps
    }

    pub fn min_temps(&self) -> &[f64] {
        &self.min_temps
    }

    pub fn max_temps(&self) -> &[f64] {
        &self.max_temps
    }

    /// Iterate rows in date order
    pub fn iter(&self) -> impl Iterator<Item = DailyValues> + '_ {
        (0..self.len()).map(move |i| DailyValues {
            date: self.dates[i],
            mean_temp: self.mean_temps[i],
            min_temp: self.min_temps[i],
            max_temp: self.max_temps[i],
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_sentinel_coordinates_are_invalid() {
        let sentinel = Coordinates::new(0.0, 0.0);
        assert!(sentinel.is_sentinel());
        assert!(!sentinel.is_valid());
    }

    #[test]
    fn test_out_of_range_coordinates_are_invalid() {
        assert!(!Coordinates::new(91.0, 10.0).is_valid());
        assert!(!Coordinates::new(45.0, -181.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 10.0).is_valid());
    }

    #[test]
    fn test_equator_and_meridian_alone_are_valid() {
        assert!(Coordinates::new(0.0, 32.5).is_valid());
        assert!(Coordinates::new(51.48, 0.0).is_valid());
    }

    #[test]
    fn test_series_rejects_misaligned_arrays() {
        let series = DailySeries::new(
            vec![date("2024-01-01"), date("2024-01-02")],
            vec![1.0, 2.0],
            vec![0.0],
            vec![3.0, 4.0],
        );
        assert!(series.is_none());
    }

    #[test]
    fn test_series_iterates_aligned_rows() {
        let series = DailySeries::new(
            vec![date("2024-01-01"), date("2024-01-02")],
            vec![1.0, 2.0],
            vec![-1.0, 0.5],
            vec![3.0, 4.0],
        )
        .unwrap();

        let rows: Vec<DailyValues> = series.iter().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].date, date("2024-01-02"));
        assert_eq!(rows[1].mean_temp, 2.0);
        assert_eq!(rows[1].min_temp, 0.5);
        assert_eq!(rows[1].max_temp, 4.0);
    }
}

//! Same-day-across-years temperature anomaly.
//!
//! The current reading is compared with the mean of the stored mean
//! temperatures for the same month and day in each of the previous N years.
//! Years without a stored value are left out of the average and reported in
//! [`AnomalyResult::missing_years`].

use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use hindcast_core::{AnomalyConfig, MAX_SPAN_YEARS};
use hindcast_store::HistoryClient;
use serde::Serialize;
use tracing::instrument;

use crate::error::HistoryError;
use crate::range::check_span;

/// A month and day with the year ignored. 29 February is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDay {
    month: u32,
    day: u32,
}

impl ReferenceDay {
    /// `None` when the pair is not a day of any year.
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2000 is a leap year, so every real month/day pair exists in it.
        NaiveDate::from_ymd_opt(2000, month, day).map(|_| Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// This day in `year`, if the year has it.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl From<NaiveDate> for ReferenceDay {
    fn from(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl FromStr for ReferenceDay {
    type Err = String;

    /// Parses `MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected MM-DD, got '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        let day: u32 = day.parse().map_err(|_| format!("invalid day in '{}'", s))?;
        Self::new(month, day).ok_or_else(|| format!("'{}' is not a calendar day", s))
    }
}

impl std::fmt::Display for ReferenceDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub average_of_years: f64,
    pub current_reading: f64,
    /// `(current - average) / average * 100`
    pub percent_deviation: f64,
    pub years_found: usize,
    pub years_requested: usize,
    /// Years with no stored value for the reference day, ascending
    pub missing_years: Vec<i32>,
}

/// Computes anomalies from what the history store already holds.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    store: HistoryClient,
    years: u32,
    min_years: u32,
}

impl AnomalyEngine {
    pub fn new(store: HistoryClient, config: &AnomalyConfig) -> Self {
        Self {
            store,
            years: config.years,
            min_years: config.min_years,
        }
    }

    /// Override the number of previous years averaged.
    pub fn with_years(mut self, years: u32) -> Self {
        self.years = years;
        self
    }

    /// Anomaly for `day` relative to the current local year.
    pub async fn compute(
        &self,
        location: &str,
        day: ReferenceDay,
        current_reading: f64,
    ) -> Result<AnomalyResult, HistoryError> {
        self.compute_as_of(location, day, current_reading, Local::now().date_naive())
            .await
    }

    /// Anomaly for `day` averaged over the `years` years before `today`'s year.
    ///
    /// # Errors
    /// `InvalidSpan` when `years` is 0 or above `MAX_SPAN_YEARS`,
    /// `InvalidReading` for a non-finite reading, `InsufficientHistory` when
    /// too few years have data, `DegenerateAverage` when the average is zero,
    /// and `Storage` for store failures.
    #[instrument(skip(self), level = "info")]
    pub async fn compute_as_of(
        &self,
        location: &str,
        day: ReferenceDay,
        current_reading: f64,
        today: NaiveDate,
    ) -> Result<AnomalyResult, HistoryError> {
        if !current_reading.is_finite() {
            return Err(HistoryError::InvalidReading(current_reading));
        }

        let span = check_span("anomaly years", self.years, MAX_SPAN_YEARS)?;
        let first = today
            .year()
            .checked_sub_unsigned(span)
            .ok_or(HistoryError::InvalidSpan {
                what: "anomaly years",
                value: span,
                max: MAX_SPAN_YEARS,
            })?;
        let years: Vec<i32> = (first..today.year()).collect();

        let mut missing_years = Vec::new();
        let mut queried = Vec::with_capacity(years.len());
        for &year in &years {
            match day.in_year(year) {
                Some(date) => queried.push((year, date)),
                None => missing_years.push(year),
            }
        }

        let temps = self
            .store
            .temperatures_on(queried.iter().map(|(_, date)| *date).collect(), location)
            .await?;

        let mut found = Vec::with_capacity(temps.len());
        for ((year, _), temp) in queried.iter().zip(temps) {
            match temp {
                Some(t) => found.push(t),
                None => missing_years.push(*year),
            }
        }
        missing_years.sort_unstable();

        let required = self.min_years.max(1) as usize;
        if found.len() < required {
            tracing::info!(
                "Only {} of {} years stored for '{}' on {}",
                found.len(),
                years.len(),
                location,
                day
            );
            return Err(HistoryError::InsufficientHistory {
                found: found.len(),
                required,
            });
        }

        let average = found.iter().sum::<f64>() / found.len() as f64;
        let percent_deviation = percent_deviation(average, current_reading)?;

        tracing::info!(
            "'{}' on {}: {:.1}° vs {:.1}° average over {} years ({:+.1}%)",
            location,
            day,
            current_reading,
            average,
            found.len(),
            percent_deviation
        );

        Ok(AnomalyResult {
            average_of_years: average,
            current_reading,
            percent_deviation,
            years_found: found.len(),
            years_requested: years.len(),
            missing_years,
        })
    }
}

/// Percent change of `current` from `average`.
///
/// # Errors
/// `DegenerateAverage` when `average` is zero.
pub fn percent_deviation(average: f64, current: f64) -> Result<f64, HistoryError> {
    if average.abs() < f64::EPSILON {
        return Err(HistoryError::DegenerateAverage { average });
    }
    Ok((current - average) / average * 100.0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use hindcast_store::{DailyRecord, SqliteHistoryStore};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn engine(store: HistoryClient) -> AnomalyEngine {
        AnomalyEngine::new(store, &AnomalyConfig::default())
    }

    async fn seed(store: &HistoryClient, location: &str, days: &[(&str, f64)]) {
        let records = days
            .iter()
            .map(|(d, t)| DailyRecord::new(location, date(d), *t, t - 5.0, t + 5.0))
            .collect();
        store.upsert_batch(records).await.unwrap();
    }

    fn store() -> HistoryClient {
        HistoryClient::new(SqliteHistoryStore::in_memory().unwrap())
    }

    fn june_15() -> ReferenceDay {
        ReferenceDay::new(6, 15).unwrap()
    }

    #[tokio::test]
    async fn test_missing_years_excluded_from_average() {
        let store = store();
        seed(
            &store,
            "Madrid",
            &[
                ("2015-06-15", 10.0),
                ("2016-06-15", 12.0),
                ("2018-06-15", 14.0),
                ("2019-06-15", 16.0),
                ("2021-06-15", 18.0),
                ("2022-06-15", 20.0),
                ("2024-06-15", 22.0),
            ],
        )
        .await;

        let result = engine(store)
            .compute_as_of("Madrid", june_15(), 17.6, date("2025-07-01"))
            .await
            .unwrap();

        assert_eq!(result.average_of_years, 16.0);
        assert_eq!(result.years_found, 7);
        assert_eq!(result.years_requested, 10);
        assert_eq!(result.missing_years, vec![2017, 2020, 2023]);
        assert!((result.percent_deviation - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_current_year_not_included() {
        let store = store();
        seed(&store, "Madrid", &[("2024-06-15", 20.0), ("2025-06-15", 40.0)]).await;

        let result = engine(store)
            .compute_as_of("Madrid", june_15(), 22.0, date("2025-07-01"))
            .await
            .unwrap();

        assert_eq!(result.average_of_years, 20.0);
        assert!((result.percent_deviation - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_history_is_insufficient() {
        let err = engine(store())
            .compute_as_of("Madrid", june_15(), 20.0, date("2025-07-01"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HistoryError::InsufficientHistory {
                found: 0,
                required: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_min_years_threshold() {
        let store = store();
        seed(&store, "Madrid", &[("2023-06-15", 20.0), ("2024-06-15", 21.0)]).await;
        let engine = AnomalyEngine::new(
            store,
            &AnomalyConfig {
                years: 10,
                min_years: 3,
            },
        );

        let err = engine
            .compute_as_of("Madrid", june_15(), 20.0, date("2025-07-01"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HistoryError::InsufficientHistory {
                found: 2,
                required: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_average_is_degenerate() {
        let store = store();
        seed(&store, "Oslo", &[("2023-01-10", -2.0), ("2024-01-10", 2.0)]).await;

        let err = engine(store)
            .compute_as_of(
                "Oslo",
                ReferenceDay::new(1, 10).unwrap(),
                1.0,
                date("2025-01-20"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HistoryError::DegenerateAverage { .. }));
    }

    #[tokio::test]
    async fn test_leap_day_only_found_in_leap_years() {
        let store = store();
        seed(&store, "Sydney", &[("2020-02-29", 24.0), ("2024-02-29", 26.0)]).await;

        let result = engine(store)
            .with_years(6)
            .compute_as_of(
                "Sydney",
                ReferenceDay::new(2, 29).unwrap(),
                27.5,
                date("2025-03-01"),
            )
            .await
            .unwrap();

        assert_eq!(result.years_found, 2);
        assert_eq!(result.average_of_years, 25.0);
        assert_eq!(result.missing_years, vec![2019, 2021, 2022, 2023]);
    }

    #[tokio::test]
    async fn test_other_locations_ignored() {
        let store = store();
        seed(&store, "Paris", &[("2024-06-15", 30.0)]).await;

        let err = engine(store)
            .compute_as_of("paris", june_15(), 20.0, date("2025-07-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::InsufficientHistory { .. }));
    }

    #[tokio::test]
    async fn test_out_of_bounds_years_rejected_before_store_read() {
        let store = store();
        seed(&store, "Madrid", &[("2024-06-15", 20.0)]).await;

        for years in [0, MAX_SPAN_YEARS + 1, 2_147_483_648, 3_000_000_000, u32::MAX] {
            let err = engine(store.clone())
                .with_years(years)
                .compute_as_of("Madrid", june_15(), 20.0, date("2025-07-01"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, HistoryError::InvalidSpan { value, .. } if value == years),
                "{years}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_largest_years_span_is_accepted() {
        let store = store();
        seed(&store, "Madrid", &[("1925-06-15", 18.0), ("2024-06-15", 22.0)]).await;

        let result = engine(store)
            .with_years(MAX_SPAN_YEARS)
            .compute_as_of("Madrid", june_15(), 22.0, date("2025-07-01"))
            .await
            .unwrap();

        assert_eq!(result.years_requested, 100);
        assert_eq!(result.years_found, 2);
        assert_eq!(result.average_of_years, 20.0);
    }

    #[tokio::test]
    async fn test_non_finite_reading_rejected() {
        let err = engine(store())
            .compute_as_of("Madrid", june_15(), f64::NAN, date("2025-07-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::InvalidReading(_)));
    }

    #[test]
    fn test_percent_deviation() {
        assert!((percent_deviation(20.0, 22.0).unwrap() - 10.0).abs() < 1e-9);
        assert!((percent_deviation(-10.0, -5.0).unwrap() - -50.0).abs() < 1e-9);
        assert!(matches!(
            percent_deviation(0.0, 5.0),
            Err(HistoryError::DegenerateAverage { .. })
        ));
    }

    #[test]
    fn test_reference_day_parsing() {
        assert_eq!("06-15".parse::<ReferenceDay>().unwrap(), june_15());
        assert_eq!("2-29".parse::<ReferenceDay>().unwrap().to_string(), "02-29");
        assert!("02-30".parse::<ReferenceDay>().is_err());
        assert!("13-01".parse::<ReferenceDay>().is_err());
        assert!("June 15".parse::<ReferenceDay>().is_err());
    }

    #[test]
    fn test_reference_day_from_date_ignores_year() {
        let day = ReferenceDay::from(date("1999-12-31"));
        assert_eq!(day.in_year(2030), Some(date("2030-12-31")));
        assert_eq!(ReferenceDay::new(2, 29).unwrap().in_year(2023), None);
    }
}

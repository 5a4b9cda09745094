//! Date ranges requested from the archive.

use chrono::{Days, Months, NaiveDate};
use hindcast_core::{MAX_INGESTION_LAG_DAYS, MAX_SPAN_YEARS};
use hindcast_weather::Coordinates;

use crate::error::HistoryError;

/// A validated archive request. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRange {
    pub location: String,
    pub coordinates: Coordinates,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl FetchRange {
    /// Validate the location key, coordinates and date order.
    ///
    /// # Errors
    /// `InvalidLocation` for a blank key or unqueryable coordinates,
    /// `InvalidRange` when `start_date > end_date`.
    pub fn new(
        location: &str,
        coordinates: Coordinates,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, HistoryError> {
        validate_target(location, coordinates)?;
        if start_date > end_date {
            return Err(HistoryError::InvalidRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            location: location.to_string(),
            coordinates,
            start_date,
            end_date,
        })
    }

    /// Number of calendar days covered, both ends inclusive.
    pub fn days(&self) -> usize {
        ((self.end_date - self.start_date).num_days() + 1) as usize
    }
}

/// Reject what cannot be synced: a blank key, or coordinates that are
/// out of range, non-finite or the `(0, 0)` sentinel.
pub(crate) fn validate_target(location: &str, coordinates: Coordinates) -> Result<(), HistoryError> {
    if location.trim().is_empty() {
        return Err(HistoryError::InvalidLocation("location is empty".to_string()));
    }
    if coordinates.is_sentinel() {
        return Err(HistoryError::InvalidLocation(format!(
            "'{}' resolved to (0, 0)",
            location
        )));
    }
    if !coordinates.is_valid() {
        return Err(HistoryError::InvalidLocation(format!(
            "coordinates ({}) are out of range",
            coordinates
        )));
    }
    Ok(())
}

/// Default archive window: ends `lag_days` before `today` and starts
/// `years` calendar years before that end.
///
/// Day-of-month is clamped, so an end of 29 February starts on 28 February.
///
/// # Errors
/// `InvalidSpan` when `years` is 0 or above `MAX_SPAN_YEARS`, or `lag_days`
/// is above `MAX_INGESTION_LAG_DAYS` or reaches before the calendar starts.
pub fn default_range(
    today: NaiveDate,
    years: u32,
    lag_days: u32,
) -> Result<(NaiveDate, NaiveDate), HistoryError> {
    let years = check_span("history years", years, MAX_SPAN_YEARS)?;
    let lag_span = HistoryError::InvalidSpan {
        what: "ingestion lag days",
        value: lag_days,
        max: MAX_INGESTION_LAG_DAYS,
    };
    if lag_days > MAX_INGESTION_LAG_DAYS {
        return Err(lag_span);
    }

    let end = today
        .checked_sub_days(Days::new(u64::from(lag_days)))
        .ok_or(lag_span)?;
    let start = end
        .checked_sub_months(Months::new(years * 12))
        .ok_or(HistoryError::InvalidSpan {
            what: "history years",
            value: years,
            max: MAX_SPAN_YEARS,
        })?;
    Ok((start, end))
}

/// `value` if it is within `1..=max`.
pub(crate) fn check_span(what: &'static str, value: u32, max: u32) -> Result<u32, HistoryError> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(HistoryError::InvalidSpan { what, value, max })
    }
}

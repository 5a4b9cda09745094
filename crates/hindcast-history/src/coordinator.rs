//! Fetch a location's daily history from the archive and persist it.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use hindcast_core::SyncConfig;
use hindcast_store::{BatchError, DailyRecord, HistoryClient, StoreError};
use hindcast_weather::{Coordinates, DailySeries, WeatherSource};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::instrument;

use crate::error::HistoryError;
use crate::range::{default_range, FetchRange};
use crate::retry::{with_retry, RetryConfig};

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Published after a sync batch for `location` has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesUpdated {
    pub location: String,
    /// Records written by the batch
    pub records: usize,
}

/// Outcome of a completed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days returned by the archive
    pub fetched: usize,
    /// Days upserted into the store
    pub applied: usize,
}

/// Drives one archive fetch and one batched upsert per sync.
///
/// Subscribers to [`SyncCoordinator::subscribe`] are told when a location's
/// stored series changed.
pub struct SyncCoordinator {
    source: Arc<dyn WeatherSource>,
    store: HistoryClient,
    retry: RetryConfig,
    history_years: u32,
    ingestion_lag_days: u32,
    updates: broadcast::Sender<SeriesUpdated>,
}

impl SyncCoordinator {
    pub fn new(source: Arc<dyn WeatherSource>, store: HistoryClient, config: &SyncConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            source,
            store,
            retry: RetryConfig::from(config),
            history_years: config.history_years,
            ingestion_lag_days: config.ingestion_lag_days,
            updates,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeriesUpdated> {
        self.updates.subscribe()
    }

    /// The range a sync without explicit dates covers when run on `today`.
    ///
    /// # Errors
    /// `InvalidSpan` when the configured span or lag is out of bounds.
    pub fn default_range(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), HistoryError> {
        default_range(today, self.history_years, self.ingestion_lag_days)
    }

    /// Sync the default range ending before today's local date.
    pub async fn sync(
        &self,
        location: &str,
        coordinates: Coordinates,
    ) -> Result<SyncReport, HistoryError> {
        self.sync_as_of(location, coordinates, Local::now().date_naive())
            .await
    }

    /// Sync the default range as if run on `today`.
    pub async fn sync_as_of(
        &self,
        location: &str,
        coordinates: Coordinates,
        today: NaiveDate,
    ) -> Result<SyncReport, HistoryError> {
        let (start, end) = self.default_range(today)?;
        self.sync_range(location, coordinates, start, end).await
    }

    /// Fetch `[start, end]` for `coordinates` and upsert it under `location`.
    ///
    /// # Errors
    /// Validation failures, network and decode failures after retries, and
    /// `SyncIncomplete` when the batch stopped partway.
    #[instrument(skip(self), level = "info")]
    pub async fn sync_range(
        &self,
        location: &str,
        coordinates: Coordinates,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SyncReport, HistoryError> {
        let range = FetchRange::new(location, coordinates, start, end)?;
        tracing::debug!(
            "Requesting {} days from {} to {}",
            range.days(),
            range.start_date,
            range.end_date
        );

        let series = with_retry(&self.retry, || {
            self.source
                .fetch_range(range.coordinates, range.start_date, range.end_date)
        })
        .await?;

        let fetched = series.len();
        let records = to_records(&range.location, &series);
        let applied = self.persist(&range.location, records).await?;

        tracing::info!(
            "Synced {} of {} days for '{}' ({} to {})",
            applied,
            fetched,
            range.location,
            range.start_date,
            range.end_date
        );

        Ok(SyncReport {
            location: range.location,
            start_date: range.start_date,
            end_date: range.end_date,
            fetched,
            applied,
        })
    }

    /// Upsert on a spawned task so the write completes and is announced even
    /// if the caller stops waiting.
    async fn persist(&self, location: &str, records: Vec<DailyRecord>) -> Result<usize, HistoryError> {
        let expected = records.len();
        let store = self.store.clone();
        let updates = self.updates.clone();
        let key = location.to_string();

        let task = tokio::spawn(async move {
            let applied = store.upsert_batch(records).await?;
            // No receivers is fine.
            let _ = updates.send(SeriesUpdated {
                location: key,
                records: applied,
            });
            Ok::<_, BatchError>(applied)
        });

        match task.await {
            Ok(Ok(applied)) => Ok(applied),
            Ok(Err(batch)) => {
                tracing::error!(
                    "Sync for '{}' stopped after {} of {} records: {}",
                    location,
                    batch.applied,
                    expected,
                    batch.source
                );
                Err(HistoryError::incomplete(batch, expected))
            }
            // A panicked or cancelled task reports no count, so 0 is a lower bound.
            Err(join) => Err(HistoryError::SyncIncomplete {
                applied: 0,
                expected,
                source: StoreError::Task(join.to_string()),
            }),
        }
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("retry", &self.retry)
            .field("history_years", &self.history_years)
            .field("ingestion_lag_days", &self.ingestion_lag_days)
            .finish_non_exhaustive()
    }
}

fn to_records(location: &str, series: &DailySeries) -> Vec<DailyRecord> {
    series
        .iter()
        .map(|day| DailyRecord::new(location, day.date, day.mean_temp, day.min_temp, day.max_temp))
        .collect()
}

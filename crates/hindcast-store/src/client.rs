//! Async handle over a history backend.
//!
//! `HistoryClient` is the explicitly constructed store handle shared by the
//! sync coordinator, anomaly engine and series projector. Backend calls run
//! on the blocking pool behind one mutex, so writes for the same location
//! never interleave with reads.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::backend::HistoryBackend;
use crate::error::{BatchError, StoreError, StoreResult};
use crate::models::DailyRecord;

#[derive(Clone)]
pub struct HistoryClient {
    backend: Arc<Mutex<Box<dyn HistoryBackend>>>,
}

impl HistoryClient {
    pub fn new(backend: impl HistoryBackend + 'static) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        }
    }

    /// Run `op` against the backend on the blocking pool.
    ///
    /// The spawned task runs to completion even if the returned future is dropped.
    async fn run<T, F>(&self, op: F) -> Result<T, tokio::task::JoinError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HistoryBackend) -> T + Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || {
            let guard = backend.lock();
            op(&**guard)
        })
        .await
    }

    pub async fn upsert(&self, record: DailyRecord) -> StoreResult<()> {
        self.run(move |b| b.upsert(&record))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Upsert `records` as one logical batch; see [`HistoryBackend::upsert_batch`].
    ///
    /// If the blocking task panics, the error reports `applied: 0` although
    /// earlier records may already be committed. Treat it as a lower bound.
    pub async fn upsert_batch(&self, records: Vec<DailyRecord>) -> Result<usize, BatchError> {
        self.run(move |b| b.upsert_batch(&records))
            .await
            .map_err(|e| BatchError::new(0, StoreError::Task(e.to_string())))?
    }

    pub async fn all_for_location(&self, location: &str) -> StoreResult<Vec<DailyRecord>> {
        let location = location.to_string();
        self.run(move |b| b.all_for_location(&location))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn temperature_on(
        &self,
        date: NaiveDate,
        location: &str,
    ) -> StoreResult<Option<f64>> {
        let location = location.to_string();
        self.run(move |b| b.temperature_on(date, &location))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Mean temperatures for several dates under one lock acquisition.
    ///
    /// The result is index-aligned with `dates`.
    pub async fn temperatures_on(
        &self,
        dates: Vec<NaiveDate>,
        location: &str,
    ) -> StoreResult<Vec<Option<f64>>> {
        let location = location.to_string();
        self.run(move |b| {
            dates
                .iter()
                .map(|date| b.temperature_on(*date, &location))
                .collect::<StoreResult<Vec<_>>>()
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn count_for_location(&self, location: &str) -> StoreResult<usize> {
        let location = location.to_string();
        self.run(move |b| b.count_for_location(&location))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn locations(&self) -> StoreResult<Vec<String>> {
        self.run(|b| b.locations())
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    pub async fn date_span(&self, location: &str) -> StoreResult<Option<(NaiveDate, NaiveDate)>> {
        let location = location.to_string();
        self.run(move |b| b.date_span(&location))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for HistoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryClient").finish_non_exhaustive()
    }
}

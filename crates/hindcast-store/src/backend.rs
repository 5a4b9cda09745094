//! History storage backend trait.

use chrono::NaiveDate;

use crate::error::{BatchError, StoreResult};
use crate::models::DailyRecord;

/// Trait for daily-record storage backends.
///
/// Implementations don't need to be Sync - the `HistoryClient` wrapper
/// serializes access via Mutex.
pub trait HistoryBackend: Send {
    /// Insert or replace the record keyed by `(location, date)`.
    ///
    /// Writing the same key twice leaves exactly one stored record holding
    /// the latest values.
    fn upsert(&self, record: &DailyRecord) -> StoreResult<()>;

    /// Upsert many records as one logical batch.
    ///
    /// Returns the number of records applied. On failure the error carries
    /// how many records were committed before it.
    ///
    /// Default implementation upserts one record at a time.
    fn upsert_batch(&self, records: &[DailyRecord]) -> Result<usize, BatchError> {
        for (applied, record) in records.iter().enumerate() {
            self.upsert(record).map_err(|e| BatchError::new(applied, e))?;
        }
        Ok(records.len())
    }

    /// All records for `location`, sorted by date ascending.
    fn all_for_location(&self, location: &str) -> StoreResult<Vec<DailyRecord>>;

    /// Mean temperature stored for `location` on `date`, if any.
    fn temperature_on(&self, date: NaiveDate, location: &str) -> StoreResult<Option<f64>>;

    /// Number of stored days for `location`.
    fn count_for_location(&self, location: &str) -> StoreResult<usize>;

    /// Distinct location keys, sorted.
    fn locations(&self) -> StoreResult<Vec<String>>;

    /// First and last stored date for `location`.
    fn date_span(&self, location: &str) -> StoreResult<Option<(NaiveDate, NaiveDate)>>;
}

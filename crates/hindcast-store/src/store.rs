//! SQLite-based history storage implementation.
//!
//! One table, `daily_records`, keyed by `(location, date)`. Dates are
//! stored as ISO `YYYY-MM-DD` text so lexical order is date order.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::backend::HistoryBackend;
use crate::error::{BatchError, StoreError, StoreResult};
use crate::models::DailyRecord;

/// Records per transaction when applying a batch.
pub const DEFAULT_BATCH_SIZE: usize = 365;

const SCHEMA_VERSION: i64 = 1;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// `(location, date, mean_temp, min_temp, max_temp)` as stored.
type RawRecord = (String, String, f64, f64, f64);

const UPSERT_SQL: &str = r#"
    INSERT INTO daily_records (location, date, mean_temp, min_temp, max_temp, synced_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(location, date) DO UPDATE SET
        mean_temp = excluded.mean_temp,
        min_temp = excluded.min_temp,
        max_temp = excluded.max_temp,
        synced_at = excluded.synced_at
"#;

/// SQLite-based daily record storage.
pub struct SqliteHistoryStore {
    conn: Connection,
    batch_size: usize,
}

impl SqliteHistoryStore {
    /// Open (or create) the store at the given path.
    ///
    /// Creates the parent directory, database file and schema if they don't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        store.init_schema()?;
        tracing::debug!("Opened weather history at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (for tests and throwaway sessions).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Set how many records each batch transaction commits.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_records (
                location TEXT NOT NULL,
                date TEXT NOT NULL,
                mean_temp REAL NOT NULL,
                min_temp REAL NOT NULL,
                max_temp REAL NOT NULL,
                synced_at TEXT NOT NULL,
                PRIMARY KEY (location, date)
            );
            "#,
        )?;

        let version: Option<i64> = self
            .conn
            .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match version {
            None => {
                self.conn.execute(
                    "INSERT INTO schema_version (id, version) VALUES (1, ?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
            Some(v) if v > SCHEMA_VERSION => {
                return Err(hindcast_core::DatabaseError::MigrationFailed(format!(
                    "database schema version {} is newer than supported version {}",
                    v, SCHEMA_VERSION
                ))
                .into());
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Read the record columns of a row. The date stays text until parsed.
    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn record_from_raw(raw: RawRecord) -> StoreResult<DailyRecord> {
        let (location, date, mean_temp, min_temp, max_temp) = raw;
        Ok(DailyRecord {
            location,
            date: Self::parse_date(&date)?,
            mean_temp,
            min_temp,
            max_temp,
        })
    }

    fn parse_date(value: &str) -> StoreResult<NaiveDate> {
        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map_err(|_| StoreError::InvalidDate(value.to_string()))
    }

    /// Apply one chunk inside a single transaction; dropped on error (rollback).
    fn write_chunk(&self, chunk: &[DailyRecord], synced_at: &str) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for record in chunk {
                stmt.execute(params![
                    record.location,
                    record.date.format(DATE_FORMAT).to_string(),
                    record.mean_temp,
                    record.min_temp,
                    record.max_temp,
                    synced_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Get the total record count across all locations.
    pub fn count(&self) -> StoreResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM daily_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl HistoryBackend for SqliteHistoryStore {
    fn upsert(&self, record: &DailyRecord) -> StoreResult<()> {
        self.conn.execute(
            UPSERT_SQL,
            params![
                record.location,
                record.date.format(DATE_FORMAT).to_string(),
                record.mean_temp,
                record.min_temp,
                record.max_temp,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn upsert_batch(&self, records: &[DailyRecord]) -> Result<usize, BatchError> {
        let synced_at = Utc::now().to_rfc3339();
        let mut applied = 0;

        for chunk in records.chunks(self.batch_size) {
            self.write_chunk(chunk, &synced_at)
                .map_err(|e| BatchError::new(applied, e))?;
            applied += chunk.len();
        }

        tracing::debug!("Upserted {} daily records", applied);
        Ok(applied)
    }

    fn all_for_location(&self, location: &str) -> StoreResult<Vec<DailyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT location, date, mean_temp, min_temp, max_temp
             FROM daily_records
             WHERE location = ?1
             ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(params![location], Self::row_to_raw)?;
        rows.map(|row| Self::record_from_raw(row?)).collect()
    }

    fn temperature_on(&self, date: NaiveDate, location: &str) -> StoreResult<Option<f64>> {
        let temp = self
            .conn
            .query_row(
                "SELECT mean_temp FROM daily_records WHERE location = ?1 AND date = ?2",
                params![location, date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(temp)
    }

    fn count_for_location(&self, location: &str) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_records WHERE location = ?1",
            params![location],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn locations(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT location FROM daily_records ORDER BY location ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn date_span(&self, location: &str) -> StoreResult<Option<(NaiveDate, NaiveDate)>> {
        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM daily_records WHERE location = ?1",
            params![location],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        match (first, last) {
            (Some(first), Some(last)) => {
                Ok(Some((Self::parse_date(&first)?, Self::parse_date(&last)?)))
            }
            _ => Ok(None),
        }
    }
}

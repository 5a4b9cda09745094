//! Error types for hindcast-store.

use std::path::PathBuf;

use hindcast_core::{DatabaseError, RusqliteErrorExt};
use thiserror::Error;

/// Result type for history store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the history store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored date could not be parsed back.
    #[error("Invalid stored date: {0}")]
    InvalidDate(String),

    /// The blocking storage task did not complete.
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.into_database_error())
    }
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Database(e) => e.user_message(),
            Self::CreateDirectory { .. } => "Unable to create the local data folder.",
            Self::InvalidDate(_) => {
                "Local weather history may be corrupted. Consider resetting app data."
            }
            Self::Task(_) => "A data operation was interrupted. Please try again.",
        }
    }
}

/// A batch write that stopped partway.
///
/// `applied` counts records that were committed before `source` occurred;
/// they stay committed.
#[derive(Debug, Error)]
#[error("Batch stopped after {applied} records: {source}")]
pub struct BatchError {
    pub applied: usize,
    #[source]
    pub source: StoreError,
}

impl BatchError {
    pub fn new(applied: usize, source: impl Into<StoreError>) -> Self {
        Self {
            applied,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusqlite_error_becomes_database_error() {
        let err: StoreError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StoreError::Database(DatabaseError::QueryFailed(_))));
    }

    #[test]
    fn test_batch_error_reports_applied_count() {
        let err = BatchError::new(730, StoreError::Task("cancelled".into()));
        assert_eq!(err.applied, 730);
        assert!(err.to_string().contains("730"));
    }
}

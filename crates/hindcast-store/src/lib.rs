//! Durable per-day temperature history for Hindcast.
//!
//! `SqliteHistoryStore` owns the `daily_records` table; `HistoryClient`
//! is the cloneable async handle the rest of the workspace talks to.

pub mod backend;
pub mod client;
pub mod error;
pub mod models;
pub mod store;

pub use backend::HistoryBackend;
pub use client::HistoryClient;
pub use error::{BatchError, StoreError, StoreResult};
pub use models::DailyRecord;
pub use store::{SqliteHistoryStore, DEFAULT_BATCH_SIZE};

//! Historical temperature sync and anomaly computation for Hindcast.
//!
//! Pipeline: resolve a date range, fetch it from the archive, upsert it
//! into the history store, project the stored series for charting, and
//! compare a current reading with the same calendar day in previous years.

pub mod anomaly;
pub mod coordinator;
pub mod error;
pub mod lookup;
pub mod projector;
pub mod range;
pub mod retry;

pub use anomaly::{AnomalyEngine, AnomalyResult, ReferenceDay};
pub use coordinator::{SeriesUpdated, SyncCoordinator, SyncReport};
pub use error::HistoryError;
pub use lookup::{LookupReport, WeatherHistory};
pub use projector::{ChartPoint, SeriesProjector};
pub use range::{default_range, FetchRange};
pub use retry::RetryConfig;

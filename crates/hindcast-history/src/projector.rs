//! Chart-ready view of a location's stored series.

use chrono::NaiveDate;
use hindcast_store::{DailyRecord, HistoryClient};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::coordinator::SeriesUpdated;
use crate::error::HistoryError;

/// One point on the temperature chart. `index` is the x position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub mean_temp: f64,
}

#[derive(Debug, Clone)]
pub struct SeriesProjector {
    store: HistoryClient,
}

impl SeriesProjector {
    pub fn new(store: HistoryClient) -> Self {
        Self { store }
    }

    /// Every stored day for `location`, oldest first.
    pub async fn project(&self, location: &str) -> Result<Vec<ChartPoint>, HistoryError> {
        let records = self.store.all_for_location(location).await?;
        tracing::debug!("Projected {} points for '{}'", records.len(), location);
        Ok(to_points(&records))
    }

    /// Wait for the next update to `location` and return the new projection.
    ///
    /// Updates for other locations are skipped. If the receiver fell behind,
    /// some updates were lost, so the series is projected anyway. Returns
    /// `None` once the coordinator is gone.
    pub async fn next_update(
        &self,
        updates: &mut broadcast::Receiver<SeriesUpdated>,
        location: &str,
    ) -> Option<Result<Vec<ChartPoint>, HistoryError>> {
        loop {
            match updates.recv().await {
                Ok(update) if update.location == location => break,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Missed {} series updates, re-projecting", skipped);
                    break;
                }
                Err(RecvError::Closed) => return None,
            }
        }
        Some(self.project(location).await)
    }
}

/// Records are expected in date order, as the store returns them.
pub fn to_points(records: &[DailyRecord]) -> Vec<ChartPoint> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| ChartPoint {
            index,
            date: record.date,
            mean_temp: record.mean_temp,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use hindcast_store::SqliteHistoryStore;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store() -> HistoryClient {
        HistoryClient::new(SqliteHistoryStore::in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_empty_store_projects_nothing() {
        let points = SeriesProjector::new(store()).project("Reykjavik").await.unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_points_indexed_in_date_order() {
        let store = store();
        for (d, t) in [("2021-03-03", 3.0), ("2021-03-01", 1.0), ("2021-03-02", 2.0)] {
            store
                .upsert(DailyRecord::new("Reykjavik", date(d), t, t - 2.0, t + 2.0))
                .await
                .unwrap();
        }

        let points = SeriesProjector::new(store).project("Reykjavik").await.unwrap();

        assert_eq!(
            points,
            vec![
                ChartPoint { index: 0, date: date("2021-03-01"), mean_temp: 1.0 },
                ChartPoint { index: 1, date: date("2021-03-02"), mean_temp: 2.0 },
                ChartPoint { index: 2, date: date("2021-03-03"), mean_temp: 3.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_next_update_skips_other_locations() {
        let store = store();
        store
            .upsert(DailyRecord::new("Quito", date("2022-08-01"), 14.0, 9.0, 19.0))
            .await
            .unwrap();
        let projector = SeriesProjector::new(store);

        let (tx, mut rx) = broadcast::channel(4);
        tx.send(SeriesUpdated { location: "Lima".into(), records: 10 }).unwrap();
        tx.send(SeriesUpdated { location: "Quito".into(), records: 1 }).unwrap();

        let points = projector.next_update(&mut rx, "Quito").await.unwrap().unwrap();
        assert_eq!(points.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_next_update_reprojects_after_lag() {
        let projector = SeriesProjector::new(store());
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(SeriesUpdated { location: "Lima".into(), records: 1 }).unwrap();
        tx.send(SeriesUpdated { location: "Lima".into(), records: 2 }).unwrap();

        let points = projector.next_update(&mut rx, "Quito").await.unwrap().unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_next_update_ends_when_sender_dropped() {
        let projector = SeriesProjector::new(store());
        let (tx, mut rx) = broadcast::channel::<SeriesUpdated>(1);
        drop(tx);

        assert!(projector.next_update(&mut rx, "Quito").await.is_none());
    }
}

//! One weather lookup end to end: resolve, read current conditions, sync
//! history, then chart and compare.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use hindcast_core::Config;
use hindcast_store::{HistoryClient, SqliteHistoryStore};
use hindcast_weather::{Coordinates, CurrentReading, Geocoder, NominatimGeocoder, OpenMeteoClient, WeatherSource};
use tracing::instrument;

use crate::anomaly::{AnomalyEngine, AnomalyResult, ReferenceDay};
use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::HistoryError;
use crate::projector::{ChartPoint, SeriesProjector};
use crate::range::validate_target;

/// Everything a lookup produced.
///
/// `anomaly` fails on its own: too little history or a zero average still
/// leaves the rest of the report usable.
#[derive(Debug)]
pub struct LookupReport {
    pub location: String,
    pub coordinates: Coordinates,
    pub current: CurrentReading,
    pub sync: SyncReport,
    pub series: Vec<ChartPoint>,
    pub anomaly: Result<AnomalyResult, HistoryError>,
}

/// Wires the weather source, geocoder and history store together.
pub struct WeatherHistory {
    geocoder: Arc<dyn Geocoder>,
    source: Arc<dyn WeatherSource>,
    store: HistoryClient,
    coordinator: SyncCoordinator,
    projector: SeriesProjector,
    anomaly: AnomalyEngine,
    today: Option<NaiveDate>,
}

impl WeatherHistory {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        source: Arc<dyn WeatherSource>,
        store: HistoryClient,
        config: &Config,
    ) -> Self {
        Self {
            coordinator: SyncCoordinator::new(source.clone(), store.clone(), &config.sync),
            projector: SeriesProjector::new(store.clone()),
            anomaly: AnomalyEngine::new(store.clone(), &config.anomaly),
            geocoder,
            source,
            store,
            today: None,
        }
    }

    /// Open the database under `config.data_dir` and build the HTTP clients.
    ///
    /// # Errors
    /// Storage errors opening the database, or network errors building a client.
    pub fn from_config(config: &Config) -> Result<Self, HistoryError> {
        let path = config.database_path();
        let store = SqliteHistoryStore::new(&path)?.with_batch_size(config.sync.batch_size);
        tracing::info!("Using weather history at {}", path.display());

        let source = OpenMeteoClient::new(&config.weather)?;
        let geocoder = NominatimGeocoder::new(&config.weather)?;

        Ok(Self::new(
            Arc::new(geocoder),
            Arc::new(source),
            HistoryClient::new(store),
            config,
        ))
    }

    /// Evaluate sync ranges and anomalies as if run on `today`.
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn store(&self) -> &HistoryClient {
        &self.store
    }

    pub fn geocoder(&self) -> &dyn Geocoder {
        self.geocoder.as_ref()
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn projector(&self) -> &SeriesProjector {
        &self.projector
    }

    pub fn anomaly_engine(&self) -> &AnomalyEngine {
        &self.anomaly
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Look up a free-text place. The trimmed text is the history key.
    pub async fn lookup(&self, place: &str) -> Result<LookupReport, HistoryError> {
        let coordinates = self.geocoder.resolve(place).await?;
        self.lookup_at(place.trim(), coordinates).await
    }

    /// Look up device coordinates, named by reverse geocoding when possible.
    ///
    /// Falls back to the formatted coordinates when the geocoder has no name
    /// or fails.
    pub async fn lookup_here(&self, coordinates: Coordinates) -> Result<LookupReport, HistoryError> {
        let name = match self.geocoder.reverse(coordinates).await {
            Ok(Some(name)) => name,
            Ok(None) => coordinates.to_string(),
            Err(e) => {
                tracing::warn!("Reverse geocoding failed, using coordinates: {}", e);
                coordinates.to_string()
            }
        };
        self.lookup_at(&name, coordinates).await
    }

    /// Look up known coordinates stored under `location`.
    ///
    /// # Errors
    /// Anything that stops current conditions, the sync or the projection.
    /// Anomaly failures are returned inside the report.
    #[instrument(skip(self), level = "info")]
    pub async fn lookup_at(
        &self,
        location: &str,
        coordinates: Coordinates,
    ) -> Result<LookupReport, HistoryError> {
        validate_target(location, coordinates)?;
        let today = self.today();

        let current = self.source.fetch_current(coordinates).await?;
        let sync = self.coordinator.sync_as_of(location, coordinates, today).await?;
        let series = self.projector.project(location).await?;
        let anomaly = self
            .anomaly
            .compute_as_of(location, ReferenceDay::from(today), current.temperature, today)
            .await;

        if let Err(ref e) = anomaly {
            tracing::info!("No anomaly for '{}': {}", location, e);
        }

        Ok(LookupReport {
            location: location.to_string(),
            coordinates,
            current,
            sync,
            series,
            anomaly,
        })
    }
}

impl std::fmt::Debug for WeatherHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherHistory")
            .field("coordinator", &self.coordinator)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use hindcast_core::NetworkError;
    use hindcast_weather::{DailySeries, WeatherError};

    struct FixedGeocoder(Option<Coordinates>);

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn resolve(&self, place: &str) -> Result<Coordinates, WeatherError> {
            self.0
                .ok_or_else(|| WeatherError::LocationNotFound(place.to_string()))
        }

        async fn reverse(&self, _: Coordinates) -> Result<Option<String>, WeatherError> {
            Err(WeatherError::Network(NetworkError::Timeout))
        }
    }

    /// Every requested day is 20.0 on average; current is 22.0.
    struct FlatSource;

    #[async_trait]
    impl WeatherSource for FlatSource {
        async fn fetch_current(&self, _: Coordinates) -> Result<CurrentReading, WeatherError> {
            Ok(CurrentReading {
                temperature: 22.0,
                is_day: true,
                day_min: 15.0,
                day_max: 25.0,
                fetched_at: Utc::now(),
            })
        }

        async fn fetch_range(
            &self,
            _: Coordinates,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<DailySeries, WeatherError> {
            let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
            let n = dates.len();
            Ok(DailySeries::new(dates, vec![20.0; n], vec![15.0; n], vec![25.0; n]).unwrap())
        }
    }

    fn history(geocoder: FixedGeocoder) -> WeatherHistory {
        let store = HistoryClient::new(SqliteHistoryStore::in_memory().unwrap());
        WeatherHistory::new(Arc::new(geocoder), Arc::new(FlatSource), store, &Config::default())
            .as_of(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap())
    }

    #[tokio::test]
    async fn test_lookup_runs_full_pipeline() {
        let history = history(FixedGeocoder(Some(Coordinates::new(41.9, 12.5))));

        let report = history.lookup(" Rome ").await.unwrap();

        assert_eq!(report.location, "Rome");
        assert_eq!(report.sync.start_date, NaiveDate::from_ymd_opt(2015, 6, 21).unwrap());
        assert_eq!(report.sync.end_date, NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());
        assert_eq!(report.series.len(), report.sync.applied);
        assert_eq!(report.series.first().unwrap().date, report.sync.start_date);

        let anomaly = report.anomaly.unwrap();
        assert_eq!(anomaly.years_found, 10);
        assert!((anomaly.percent_deviation - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_place_fails_before_fetching() {
        let history = history(FixedGeocoder(None));
        let err = history.lookup("Atlantis").await.unwrap_err();
        assert!(matches!(err, HistoryError::LocationNotFound(_)));
        assert!(history.store().locations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_result_is_invalid_location() {
        let history = history(FixedGeocoder(Some(Coordinates::new(0.0, 0.0))));
        let err = history.lookup("Null Island").await.unwrap_err();
        assert!(matches!(err, HistoryError::InvalidLocation(_)));
    }

    #[tokio::test]
    async fn test_lookup_here_falls_back_to_coordinates() {
        let history = history(FixedGeocoder(None));
        let report = history.lookup_here(Coordinates::new(-33.8688, 151.2093)).await.unwrap();
        assert_eq!(report.location, "-33.8688, 151.2093");
    }
}

//! Application state
//!
//! Owns the selected location and wires the unit store, the place resolver
//! and the forecast fetcher together. The forecast query is always derived
//! from the selected location and the current units, so a change to either
//! one re-queries the fetcher.

use crate::api::{ForecastApi, GeocodingApi, OpenMeteoClient};
use crate::config::DashboardConfig;
use crate::display::DashboardView;
use crate::fetcher::{ForecastFetcher, RetryPolicy};
use crate::models::location::AUTO_TIMEZONE;
use crate::models::{FetchState, ForecastQuery, Location, UnitPreferences};
use crate::preferences::UnitStore;
use crate::resolver::{PlaceResolver, ResolverState};
use crate::error::DashboardError;
use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Dashboard {
    units: UnitStore,
    resolver: PlaceResolver,
    shared: Arc<Shared>,
    units_watcher: JoinHandle<()>,
}

struct Shared {
    fetcher: ForecastFetcher,
    location: Mutex<Option<Location>>,
    default_timezone: String,
}

impl Shared {
    fn query_for(&self, location: &Location, units: UnitPreferences) -> ForecastQuery {
        let mut query = ForecastQuery::for_location(location, units);
        if query.timezone == AUTO_TIMEZONE {
            query.timezone.clone_from(&self.default_timezone);
        }
        query
    }

    /// Re-derive the query from the selected location. The location lock is
    /// held until the fetcher has the query, so a concurrent reset can't be
    /// overwritten by a stale location.
    fn refresh(&self, units: UnitPreferences) {
        let location = self.location.lock();
        let query = location
            .as_ref()
            .map(|location| self.query_for(location, units));
        self.fetcher.set_query(query);
    }
}

fn check_coordinates(location: &Location) -> Result<()> {
    if !(-90.0..=90.0).contains(&location.latitude) {
        return Err(DashboardError::validation(format!(
            "latitude {} is outside -90..90",
            location.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&location.longitude) {
        return Err(DashboardError::validation(format!(
            "longitude {} is outside -180..180",
            location.longitude
        )));
    }
    Ok(())
}

impl Dashboard {
    /// Dashboard talking to Open-Meteo as configured
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let client = Arc::new(OpenMeteoClient::new(config)?);
        Ok(Self::new(client.clone(), client, config))
    }

    /// Dashboard over the given backends.
    ///
    /// Spawns the task that follows unit changes, so it must be called from
    /// within a tokio runtime.
    pub fn new(
        geocoder: Arc<dyn GeocodingApi>,
        forecaster: Arc<dyn ForecastApi>,
        config: &DashboardConfig,
    ) -> Self {
        let units = UnitStore::new(config.defaults.units);
        let resolver = PlaceResolver::new(geocoder, &config.search);
        let shared = Arc::new(Shared {
            fetcher: ForecastFetcher::new(forecaster, RetryPolicy::from_config(config)),
            location: Mutex::new(None),
            default_timezone: config.defaults.timezone.clone(),
        });

        let mut changes = units.subscribe();
        let watcher_state = Arc::clone(&shared);
        let units_watcher = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let units = *changes.borrow_and_update();
                debug!(%units, "Units changed, refreshing forecast query");
                watcher_state.refresh(units);
            }
        });

        Self {
            units,
            resolver,
            shared,
            units_watcher,
        }
    }

    /// Debounced place search
    pub fn search(&self, query: &str) {
        self.resolver.search(query);
    }

    /// Immediate place search, as from the search button or a voice
    /// transcript
    pub fn submit(&self, query: &str) {
        self.resolver.submit(query);
    }

    /// Select a candidate from the visible list and start fetching its
    /// forecast
    pub fn select(&self, index: usize) -> Result<Location> {
        let count = self.resolver.state().candidates.len();
        let location = self.resolver.select_index(index).ok_or_else(|| {
            DashboardError::validation(format!(
                "no search result {} ({count} available)",
                index + 1
            ))
        })?;
        self.select_location(location.clone())?;
        Ok(location)
    }

    /// Make `location` the selected place.
    ///
    /// Coordinates outside the valid ranges are rejected and the current
    /// selection is kept.
    pub fn select_location(&self, location: Location) -> Result<()> {
        check_coordinates(&location)?;
        info!(
            "Location set to {} ({})",
            location.label(),
            location.format_coordinates()
        );
        let units = self.units.get();
        let mut selected = self.shared.location.lock();
        let query = self.shared.query_for(&location, units);
        *selected = Some(location);
        self.shared.fetcher.set_query(Some(query));
        Ok(())
    }

    pub fn set_units(&self, units: UnitPreferences) {
        self.units.set(units);
        self.shared.refresh(units);
    }

    /// Flip between metric and imperial units
    pub fn toggle_units(&self) -> UnitPreferences {
        let units = self.units.toggle();
        self.shared.refresh(units);
        units
    }

    /// Recover from a failed fetch by dropping the selected location.
    ///
    /// The fetcher goes back to `Idle` and a new search is needed.
    pub fn retry(&self) {
        info!("Resetting selected location");
        let mut selected = self.shared.location.lock();
        *selected = None;
        self.shared.fetcher.set_query(None);
    }

    #[must_use]
    pub fn location(&self) -> Option<Location> {
        self.shared.location.lock().clone()
    }

    #[must_use]
    pub fn units(&self) -> UnitPreferences {
        self.units.get()
    }

    /// Shared handle to the unit store
    #[must_use]
    pub fn unit_store(&self) -> &UnitStore {
        &self.units
    }

    #[must_use]
    pub fn fetch_state(&self) -> FetchState {
        self.shared.fetcher.state()
    }

    #[must_use]
    pub fn search_state(&self) -> ResolverState {
        self.resolver.state()
    }

    #[must_use]
    pub fn subscribe_fetch(&self) -> watch::Receiver<FetchState> {
        self.shared.fetcher.subscribe()
    }

    #[must_use]
    pub fn subscribe_search(&self) -> watch::Receiver<ResolverState> {
        self.resolver.subscribe()
    }

    /// View of the current forecast in the current units, if there is one
    #[must_use]
    pub fn view(&self, active_day: usize) -> Option<DashboardView> {
        let state = self.fetch_state();
        let result = state.result()?;
        let location = self.location()?;
        Some(DashboardView::build(
            &location,
            result,
            self.units(),
            active_day,
        ))
    }

    /// Stop all pending commits and the unit watcher
    pub fn shutdown(&self) {
        self.resolver.shutdown();
        self.shared.fetcher.shutdown();
        self.units_watcher.abort();
        info!("Dashboard shut down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.units_watcher.abort();
    }
}

//! `weatherdash` - terminal weather dashboard over Open-Meteo
//!
//! This library provides the forecast-acquisition pipeline: debounced place
//! search, forecast fetching with retry and supersession, decoding of the
//! columnar forecast payload and unit conversion for display.

pub mod api;
pub mod config;
pub mod convert;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod materialize;
pub mod models;
pub mod preferences;
pub mod resolver;
pub mod telemetry;

// Re-export core types for public API
pub use api::{ForecastApi, GeocodingApi, OpenMeteoClient};
pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use display::DashboardView;
pub use error::{DashboardError, SearchCondition};
pub use fetcher::{ForecastFetcher, RetryPolicy};
pub use materialize::{ColumnarBlock, ColumnarResponse, CurrentBlock};
pub use models::{
    FetchState, ForecastQuery, ForecastResult, GeocodeCandidate, Location, TimeSeries,
    UnitPreferences,
};
pub use preferences::UnitStore;
pub use resolver::{PlaceResolver, ResolverState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, DashboardError>;

//! Data models for the dashboard
//!
//! This module contains the core domain models organized by concern:
//! - Units: measurement systems and the per-quantity unit enumerations
//! - Location: geocoding candidates and the selected place
//! - Weather: condition categories, observations and time series
//! - Forecast: query keys, decoded results and the fetch state

pub mod forecast;
pub mod location;
pub mod units;
pub mod weather;

// Re-export all public types for convenient access
pub use forecast::{FetchState, ForecastMetadata, ForecastQuery, ForecastResult};
pub use location::{GeocodeCandidate, Location};
pub use units::{PrecipitationUnit, TemperatureUnit, UnitPreferences, WindSpeedUnit};
pub use weather::{CurrentObservation, DailyPoint, HourlyPoint, TimeSeries, WeatherCategory};

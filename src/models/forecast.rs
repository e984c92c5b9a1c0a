//! Forecast query, result and fetch state

use super::location::Location;
use super::units::UnitPreferences;
use super::weather::{
    CurrentObservation, DailyPoint, HourlyPoint, TimeSeries, code_from_sample, local_instant,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coordinates closer than this (in degrees) are the same place
pub const COORDINATE_EPSILON: f64 = 1e-6;

/// Everything a forecast request depends on.
///
/// Two queries are equal when the coordinates match within
/// [`COORDINATE_EPSILON`] and every other field matches exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub units: UnitPreferences,
}

impl ForecastQuery {
    /// Query for a selected location in the given units
    #[must_use]
    pub fn for_location(location: &Location, units: UnitPreferences) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            timezone: location.forecast_timezone(),
            units,
        }
    }
}

impl PartialEq for ForecastQuery {
    fn eq(&self, other: &Self) -> bool {
        (self.latitude - other.latitude).abs() < COORDINATE_EPSILON
            && (self.longitude - other.longitude).abs() < COORDINATE_EPSILON
            && self.timezone == other.timezone
            && self.units == other.units
    }
}

/// Location metadata echoed back by the forecast API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub timezone: Option<String>,
    pub utc_offset_seconds: i64,
}

/// A decoded forecast. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub metadata: ForecastMetadata,
    /// Units the values were requested and delivered in
    pub units: UnitPreferences,
    pub current: Option<CurrentObservation>,
    pub hourly: TimeSeries,
    pub daily: TimeSeries,
    pub fetched_at: DateTime<Utc>,
}

impl ForecastResult {
    /// Hourly series as rows
    #[must_use]
    pub fn hourly_points(&self) -> Vec<HourlyPoint> {
        let series = &self.hourly;
        series
            .timestamps
            .iter()
            .enumerate()
            .map(|(i, time)| HourlyPoint {
                time: *time,
                temperature: series.value_at("temperature_2m", i),
                apparent_temperature: series.value_at("apparent_temperature", i),
                relative_humidity: series.value_at("relativehumidity_2m", i),
                precipitation: series.value_at("precipitation", i),
                weather_code: series.value_at("weathercode", i).and_then(code_from_sample),
                wind_speed: series.value_at("windspeed_10m", i),
            })
            .collect()
    }

    /// Daily series as rows. Sunrise and sunset are shifted to the
    /// location's wall clock like every other timestamp.
    #[must_use]
    pub fn daily_points(&self) -> Vec<DailyPoint> {
        let series = &self.daily;
        let offset = self.metadata.utc_offset_seconds;
        let instant = |name: &str, i: usize| {
            series
                .value_at(name, i)
                .filter(|secs| secs.is_finite())
                .and_then(|secs| local_instant(secs as i64, offset))
        };

        series
            .timestamps
            .iter()
            .enumerate()
            .map(|(i, date)| DailyPoint {
                date: *date,
                temperature_max: series.value_at("temperature_2m_max", i),
                temperature_min: series.value_at("temperature_2m_min", i),
                weather_code: series.value_at("weathercode", i).and_then(code_from_sample),
                sunrise: instant("sunrise", i),
                sunset: instant("sunset", i),
            })
            .collect()
    }
}

/// State of the forecast fetcher. Exactly one holds at any time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchState {
    /// No location selected
    #[default]
    Idle,
    Loading,
    Success(std::sync::Arc<ForecastResult>),
    /// All attempts failed; carries the underlying error text for logs
    Failed(String),
}

impl FetchState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            Self::Success(result) => Some(result.as_ref()),
            _ => None,
        }
    }

    /// Short name of the state, for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success(_) => "success",
            Self::Failed(_) => "failed",
        }
    }
}

//! Weather data models: condition categories, the current observation and
//! row-aligned time series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variables requested for the current block and the hourly series, in
/// positional order
pub const HOURLY_VARIABLES: [&str; 6] = [
    "temperature_2m",
    "apparent_temperature",
    "relativehumidity_2m",
    "precipitation",
    "weathercode",
    "windspeed_10m",
];

/// Variables requested for the daily series, in positional order
pub const DAILY_VARIABLES: [&str; 5] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "weathercode",
    "sunrise",
    "sunset",
];

/// Display category selected from a weather code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCategory {
    #[default]
    Clear,
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    Rain,
    Snow,
    Storm,
}

impl WeatherCategory {
    /// Map a weather code to its category. Unknown codes count as clear.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            51 | 53 | 55 | 56 | 57 => Self::Drizzle,
            61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => Self::Rain,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Storm,
            _ => Self::Clear,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Clear => "Sunny",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Storm => "Storm",
        }
    }
}

/// Convert a weather code to a human-readable description
#[must_use]
pub fn describe_weather_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Weather code carried as a float sample, `None` when it is not a number
#[must_use]
pub fn code_from_sample(sample: f64) -> Option<i32> {
    if sample.is_finite() {
        // Codes are small non-negative integers; the cast saturates anything else.
        Some(sample.round() as i32)
    } else {
        None
    }
}

/// Shift a unix timestamp by the location's utc offset.
///
/// The result is the location's wall-clock time expressed as a UTC instant,
/// which is how every timestamp in a forecast result is stored.
#[must_use]
pub fn local_instant(unix_seconds: i64, utc_offset_seconds: i64) -> Option<DateTime<Utc>> {
    let shifted = unix_seconds.checked_add(utc_offset_seconds)?;
    DateTime::from_timestamp(shifted, 0)
}

/// Observation for a single instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentObservation {
    /// Observation time (location wall clock, see [`local_instant`])
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub apparent_temperature: f64,
    /// Relative humidity in percent
    pub relative_humidity: f64,
    pub precipitation: f64,
    pub weather_code: i32,
    pub wind_speed: f64,
}

impl CurrentObservation {
    #[must_use]
    pub fn category(&self) -> WeatherCategory {
        WeatherCategory::from_code(self.weather_code)
    }
}

/// Time series with one value array per variable, aligned to `timestamps`.
///
/// Every array in `values` either has exactly `timestamps.len()` entries or is
/// empty (the variable could not be decoded). `NaN` entries mark instants for
/// which the provider had no value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: BTreeMap<String, Vec<f64>>,
}

impl TimeSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Values of a variable, empty when the variable is missing
    #[must_use]
    pub fn variable(&self, name: &str) -> &[f64] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Value of a variable at a timestamp index.
    ///
    /// Returns `None` for missing variables, out-of-range indices and `NaN`
    /// samples, so short arrays are read as "no data" instead of panicking.
    #[must_use]
    pub fn value_at(&self, name: &str, index: usize) -> Option<f64> {
        self.variable(name)
            .get(index)
            .copied()
            .filter(|value| !value.is_nan())
    }
}

/// One row of the hourly series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub weather_code: Option<i32>,
    pub wind_speed: Option<f64>,
}

/// One row of the daily series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: DateTime<Utc>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub weather_code: Option<i32>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

//! Location model: geocoding candidates and the selected place

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Timezone sent to the forecast API when the place carries none
pub const AUTO_TIMEZONE: &str = "auto";

/// One entry of a geocoding search result
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeocodeCandidate {
    /// Provider identifier, when present
    #[serde(default)]
    pub id: Option<u64>,
    /// Place name
    pub name: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// IANA timezone name
    #[serde(default)]
    pub timezone: Option<String>,
    /// Country name
    #[serde(default)]
    pub country: Option<String>,
    /// First-level administrative region (state, province, ...)
    #[serde(default)]
    pub admin1: Option<String>,
}

impl GeocodeCandidate {
    /// Display label: `name[, admin1][, country]`
    #[must_use]
    pub fn label(&self) -> String {
        join_label(&self.name, self.admin1.as_deref(), self.country.as_deref())
    }
}

/// A selected place. Immutable once selected, replaced by the next selection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Location name (city, region, etc.)
    pub name: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// IANA timezone name, `None` lets the forecast API pick
    pub timezone: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// First-level administrative region
    pub admin_region: Option<String>,
}

impl Location {
    /// Create a new location without any metadata
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: String) -> Self {
        Self {
            name,
            latitude,
            longitude,
            timezone: None,
            country: None,
            admin_region: None,
        }
    }

    /// Display label: `name[, admin region][, country]`
    #[must_use]
    pub fn label(&self) -> String {
        join_label(
            &self.name,
            self.admin_region.as_deref(),
            self.country.as_deref(),
        )
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Timezone to request forecasts in.
    ///
    /// Falls back to [`AUTO_TIMEZONE`] when the place has no timezone or the
    /// name is not a known IANA zone.
    #[must_use]
    pub fn forecast_timezone(&self) -> String {
        match self.timezone.as_deref() {
            Some(name) if name == AUTO_TIMEZONE || name.parse::<Tz>().is_ok() => name.to_string(),
            Some(name) => {
                tracing::debug!("Unknown timezone '{}', using '{}'", name, AUTO_TIMEZONE);
                AUTO_TIMEZONE.to_string()
            }
            None => AUTO_TIMEZONE.to_string(),
        }
    }
}

impl From<GeocodeCandidate> for Location {
    fn from(candidate: GeocodeCandidate) -> Self {
        Self {
            name: candidate.name,
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            timezone: candidate.timezone,
            country: candidate.country,
            admin_region: candidate.admin1,
        }
    }
}

fn join_label(name: &str, region: Option<&str>, country: Option<&str>) -> String {
    let mut label = name.to_string();
    for part in [region, country].into_iter().flatten() {
        if !part.is_empty() {
            label.push_str(", ");
            label.push_str(part);
        }
    }
    label
}

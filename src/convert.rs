//! Unit conversion for display
//!
//! Pure formatting from a raw metric value to the string shown for the
//! selected unit. Stored values are never rewritten; rounding happens here
//! only.

use crate::models::{PrecipitationUnit, TemperatureUnit, WindSpeedUnit};

/// Shown in place of a value the forecast has no data for
pub const MISSING: &str = "--";

const KMH_PER_MPH: f64 = 1.609;
const MM_PER_INCH: f64 = 25.4;

fn rounded(value: f64) -> i64 {
    // Saturating cast; callers filter non-finite values first
    value.round() as i64
}

/// Format a Celsius temperature in the given unit
#[must_use]
pub fn format_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    if !celsius.is_finite() {
        return MISSING.to_string();
    }
    let value = match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 1.8 + 32.0,
    };
    format!("{}{}", rounded(value), unit.symbol())
}

/// Format a km/h wind speed in the given unit
#[must_use]
pub fn format_wind_speed(kmh: f64, unit: WindSpeedUnit) -> String {
    if !kmh.is_finite() {
        return MISSING.to_string();
    }
    let value = match unit {
        WindSpeedUnit::Kmh => kmh,
        WindSpeedUnit::Mph => kmh / KMH_PER_MPH,
    };
    format!("{} {}", rounded(value), unit.symbol())
}

/// Format a millimetre precipitation amount in the given unit
#[must_use]
pub fn format_precipitation(mm: f64, unit: PrecipitationUnit) -> String {
    if !mm.is_finite() {
        return MISSING.to_string();
    }
    match unit {
        PrecipitationUnit::Mm => format!("{mm:.1} {}", unit.symbol()),
        PrecipitationUnit::Inch => format!("{:.2} {}", mm / MM_PER_INCH, unit.symbol()),
    }
}

#[must_use]
pub fn to_celsius(value: f64, from: TemperatureUnit) -> f64 {
    match from {
        TemperatureUnit::Celsius => value,
        TemperatureUnit::Fahrenheit => (value - 32.0) / 1.8,
    }
}

#[must_use]
pub fn to_kmh(value: f64, from: WindSpeedUnit) -> f64 {
    match from {
        WindSpeedUnit::Kmh => value,
        WindSpeedUnit::Mph => value * KMH_PER_MPH,
    }
}

#[must_use]
pub fn to_mm(value: f64, from: PrecipitationUnit) -> f64 {
    match from {
        PrecipitationUnit::Mm => value,
        PrecipitationUnit::Inch => value * MM_PER_INCH,
    }
}

/// Format a temperature that was delivered in `measured` for display in
/// `display`.
///
/// Values already in the display unit are only rounded. Anything else goes
/// through Celsius first.
#[must_use]
pub fn display_temperature(
    value: f64,
    measured: TemperatureUnit,
    display: TemperatureUnit,
) -> String {
    if measured == display {
        if !value.is_finite() {
            return MISSING.to_string();
        }
        return format!("{}{}", rounded(value), display.symbol());
    }
    format_temperature(to_celsius(value, measured), display)
}

#[must_use]
pub fn display_wind_speed(value: f64, measured: WindSpeedUnit, display: WindSpeedUnit) -> String {
    if measured == display {
        if !value.is_finite() {
            return MISSING.to_string();
        }
        return format!("{} {}", rounded(value), display.symbol());
    }
    format_wind_speed(to_kmh(value, measured), display)
}

#[must_use]
pub fn display_precipitation(
    value: f64,
    measured: PrecipitationUnit,
    display: PrecipitationUnit,
) -> String {
    format_precipitation(to_mm(value, measured), display)
}

//! Measurement units the dashboard can display and request from the forecast API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Temperature unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Wind speed unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Kmh,
    Mph,
}

/// Precipitation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationUnit {
    #[default]
    Mm,
    Inch,
}

impl TemperatureUnit {
    /// Value of the `temperature_unit` query parameter
    #[must_use]
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl WindSpeedUnit {
    /// Value of the `windspeed_unit` query parameter
    #[must_use]
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Kmh => "kmh",
            Self::Mph => "mph",
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Kmh => "km/h",
            Self::Mph => "mph",
        }
    }
}

impl PrecipitationUnit {
    /// Value of the `precipitation_unit` query parameter
    #[must_use]
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Mm => "mm",
            Self::Inch => "inch",
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Mm => "mm",
            Self::Inch => "in",
        }
    }
}

/// The active measurement system, one unit per measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct UnitPreferences {
    #[serde(default)]
    pub temperature: TemperatureUnit,
    #[serde(default)]
    pub wind_speed: WindSpeedUnit,
    #[serde(default)]
    pub precipitation: PrecipitationUnit,
}

impl UnitPreferences {
    /// Celsius, km/h and millimetres
    #[must_use]
    pub const fn metric() -> Self {
        Self {
            temperature: TemperatureUnit::Celsius,
            wind_speed: WindSpeedUnit::Kmh,
            precipitation: PrecipitationUnit::Mm,
        }
    }

    /// Fahrenheit, mph and inches
    #[must_use]
    pub const fn imperial() -> Self {
        Self {
            temperature: TemperatureUnit::Fahrenheit,
            wind_speed: WindSpeedUnit::Mph,
            precipitation: PrecipitationUnit::Inch,
        }
    }

    /// Whether the temperature unit is the metric one.
    ///
    /// The units toggle keys off temperature alone, so mixed preferences
    /// flip to whichever full system temperature is not currently in.
    #[must_use]
    pub fn is_metric(&self) -> bool {
        self.temperature == TemperatureUnit::Celsius
    }

    /// The opposite measurement system
    #[must_use]
    pub fn toggled(&self) -> Self {
        if self.is_metric() {
            Self::imperial()
        } else {
            Self::metric()
        }
    }
}

impl fmt::Display for UnitPreferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.temperature.as_param(),
            self.wind_speed.as_param(),
            self.precipitation.as_param()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_metric() {
        assert_eq!(UnitPreferences::default(), UnitPreferences::metric());
    }

    #[test]
    fn test_toggle_round_trip() {
        let metric = UnitPreferences::metric();
        assert_eq!(metric.toggled(), UnitPreferences::imperial());
        assert_eq!(metric.toggled().toggled(), metric);
    }

    #[test]
    fn test_toggle_mixed_preferences() {
        let mixed = UnitPreferences {
            temperature: TemperatureUnit::Celsius,
            wind_speed: WindSpeedUnit::Mph,
            precipitation: PrecipitationUnit::Mm,
        };
        assert_eq!(mixed.toggled(), UnitPreferences::imperial());
    }

    #[test]
    fn test_query_parameter_values() {
        let imperial = UnitPreferences::imperial();
        assert_eq!(imperial.temperature.as_param(), "fahrenheit");
        assert_eq!(imperial.wind_speed.as_param(), "mph");
        assert_eq!(imperial.precipitation.as_param(), "inch");
        assert_eq!(imperial.to_string(), "fahrenheit/mph/inch");
    }

    #[test]
    fn test_deserialize_lowercase() {
        let prefs: UnitPreferences = serde_json::from_str(
            r#"{"temperature":"fahrenheit","wind_speed":"kmh","precipitation":"inch"}"#,
        )
        .unwrap();
        assert_eq!(prefs.temperature, TemperatureUnit::Fahrenheit);
        assert_eq!(prefs.wind_speed, WindSpeedUnit::Kmh);
        assert_eq!(prefs.precipitation, PrecipitationUnit::Inch);
    }
}

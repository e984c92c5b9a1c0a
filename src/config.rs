//! Configuration management for the weather dashboard
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::DashboardError;
use crate::models::UnitPreferences;
use crate::models::location::AUTO_TIMEZONE;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the weather dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Upstream API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Place search behaviour
    #[serde(default)]
    pub search: SearchConfig,
    /// Forecast fetch retry behaviour
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Default application settings
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Upstream API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the geocoding API
    #[serde(default = "default_geocoding_base_url")]
    pub geocoding_base_url: String,
    /// Base URL of the forecast API
    #[serde(default = "default_forecast_base_url")]
    pub forecast_base_url: String,
    /// Forecast request timeout in seconds
    #[serde(default = "default_forecast_timeout")]
    pub forecast_timeout_seconds: u32,
    /// Geocoding request timeout in seconds, transport default when unset
    #[serde(default)]
    pub geocoding_timeout_seconds: Option<u32>,
}

/// Place search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Quiescence window before a typed query is sent
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Queries shorter than this never reach the network
    #[serde(default = "default_min_query_length")]
    pub min_query_length: usize,
    /// Maximum number of candidates requested and kept
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Language of place names
    #[serde(default = "default_language")]
    pub language: String,
}

/// Forecast fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total attempts per query, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Linear backoff step; the delay after attempt `n` is `n * step`
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Default application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Units active at startup
    #[serde(default)]
    pub units: UnitPreferences,
    /// Timezone used when a place has none
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

// Default value functions
fn default_geocoding_base_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_forecast_base_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_forecast_timeout() -> u32 {
    15
}

fn default_debounce_ms() -> u64 {
    350
}

fn default_min_query_length() -> usize {
    2
}

fn default_max_results() -> usize {
    8
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_timezone() -> String {
    AUTO_TIMEZONE.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            geocoding_base_url: default_geocoding_base_url(),
            forecast_base_url: default_forecast_base_url(),
            forecast_timeout_seconds: default_forecast_timeout(),
            geocoding_timeout_seconds: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            min_query_length: default_min_query_length(),
            max_results: default_max_results(),
            language: default_language(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            units: UnitPreferences::default(),
            timezone: default_timezone(),
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn forecast_timeout(&self) -> Duration {
        Duration::from_secs(self.forecast_timeout_seconds.into())
    }

    #[must_use]
    pub fn geocoding_timeout(&self) -> Option<Duration> {
        self.geocoding_timeout_seconds
            .map(|secs| Duration::from_secs(secs.into()))
    }
}

impl SearchConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl DashboardConfig {
    /// Load configuration from `config_path`, or the default location, plus
    /// environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. WEATHERDASH_SEARCH__DEBOUNCE_MS=500
        builder = builder.add_source(
            Environment::with_prefix("WEATHERDASH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: DashboardConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        tracing::debug!("Loaded configuration from {}", config_file.display());
        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weatherdash").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.api.geocoding_base_url.is_empty() {
            self.api.geocoding_base_url = default_geocoding_base_url();
        }
        if self.api.forecast_base_url.is_empty() {
            self.api.forecast_base_url = default_forecast_base_url();
        }
        if self.api.forecast_timeout_seconds == 0 {
            self.api.forecast_timeout_seconds = default_forecast_timeout();
        }
        if self.search.max_results == 0 {
            self.search.max_results = default_max_results();
        }
        if self.search.language.is_empty() {
            self.search.language = default_language();
        }
        if self.fetch.max_attempts == 0 {
            self.fetch.max_attempts = default_max_attempts();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.defaults.timezone.is_empty() {
            self.defaults.timezone = default_timezone();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.api.forecast_timeout_seconds > 300 {
            return Err(
                DashboardError::config("Forecast timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.fetch.max_attempts > 10 {
            return Err(DashboardError::config("Forecast max attempts cannot exceed 10").into());
        }

        if self.fetch.backoff_step_ms > 60_000 {
            return Err(
                DashboardError::config("Backoff step cannot exceed 60000 ms").into(),
            );
        }

        if self.search.debounce_ms > 10_000 {
            return Err(DashboardError::config("Search debounce cannot exceed 10000 ms").into());
        }

        if self.search.max_results > 100 {
            return Err(DashboardError::config("Search results cannot exceed 100").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(DashboardError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(DashboardError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Geocoding", &self.api.geocoding_base_url),
            ("Forecast", &self.api.forecast_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DashboardError::config(format!(
                    "{name} API base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(
            config.api.geocoding_base_url,
            "https://geocoding-api.open-meteo.com/v1"
        );
        assert_eq!(config.api.forecast_base_url, "https://api.open-meteo.com/v1");
        assert_eq!(config.api.forecast_timeout(), Duration::from_secs(15));
        assert!(config.api.geocoding_timeout().is_none());
        assert_eq!(config.search.debounce(), Duration::from_millis(350));
        assert_eq!(config.search.min_query_length, 2);
        assert_eq!(config.search.max_results, 8);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.backoff_step_ms, 500);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.defaults.timezone, "auto");
        assert_eq!(config.defaults.units, UnitPreferences::metric());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(DashboardConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = DashboardConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = DashboardConfig::default();
        config.api.forecast_timeout_seconds = 500;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));
    }

    #[test]
    fn test_config_validation_url_scheme() {
        let mut config = DashboardConfig::default();
        config.api.forecast_base_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Forecast API base URL"));
    }

    #[test]
    fn test_apply_defaults_fills_empty_values() {
        let mut config = DashboardConfig::default();
        config.api.forecast_base_url.clear();
        config.fetch.max_attempts = 0;
        config.logging.format.clear();
        config.apply_defaults();
        assert_eq!(config.api.forecast_base_url, "https://api.open-meteo.com/v1");
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "weatherdash-config-test-{}.toml",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[search]\ndebounce_ms = 500\n\n[defaults.units]\ntemperature = \"fahrenheit\""
        )
        .unwrap();

        let config = DashboardConfig::load_from_path(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.search.debounce_ms, 500);
        assert_eq!(config.search.max_results, 8);
        assert_eq!(
            config.defaults.units.temperature,
            crate::models::TemperatureUnit::Fahrenheit
        );
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = DashboardConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("weatherdash"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }
}

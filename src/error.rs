//! Error types and handling for the weather dashboard

use thiserror::Error;

/// Shown for any forecast failure; the underlying error only goes to logs
pub const FETCH_FAILED_MESSAGE: &str = "Couldn't fetch weather. Please try again.";

/// Main error type for the weather dashboard
#[derive(Error, Debug)]
pub enum DashboardError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Place search failed in transport or while parsing the response
    #[error("Geocoding error: {message}")]
    Geocode { message: String },

    /// Forecast request failed or the provider answered with an error
    #[error("Forecast error: {message}")]
    Forecast { message: String },

    /// The forecast payload could not be decoded as a whole
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The request did not complete within its time budget
    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The request's inputs changed before it completed
    #[error("Request superseded by a newer one")]
    Superseded,

    /// HTTP transport errors
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },
}

impl DashboardError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new geocoding error
    pub fn geocode<S: Into<String>>(message: S) -> Self {
        Self::Geocode {
            message: message.into(),
        }
    }

    /// Create a new forecast error
    pub fn forecast<S: Into<String>>(message: S) -> Self {
        Self::Forecast {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether this error only means a newer request took over
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            DashboardError::Geocode { .. } => {
                "Place search failed. Please try again.".to_string()
            }
            DashboardError::Forecast { .. }
            | DashboardError::Decode { .. }
            | DashboardError::Timeout { .. }
            | DashboardError::Http { .. }
            | DashboardError::Superseded => FETCH_FAILED_MESSAGE.to_string(),
            DashboardError::Validation { message } => format!("Invalid input: {message}"),
        }
    }
}

/// Outcome of a place search that leaves the candidate list empty.
///
/// These never go through the forecast fetcher; the UI matches on them to
/// tell "nothing found" apart from "search broke".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchCondition {
    /// The geocoder answered with zero matches
    NoResults,
    /// Transport or parse failure while geocoding
    FailedGeocode,
}

impl SearchCondition {
    /// Stable condition code
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NoResults => "NO_RESULTS",
            Self::FailedGeocode => "FAILED_GEOCODE",
        }
    }

    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NoResults => "No search result found!",
            Self::FailedGeocode => "Place search failed. Please try again.",
        }
    }
}

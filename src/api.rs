//! Open-Meteo API client
//!
//! HTTP transport for the two upstream APIs: place search on the geocoding
//! API and the forecast endpoint. The forecast JSON is requested with unix
//! timestamps and reduced to the columnar form the materializer consumes.

use crate::config::DashboardConfig;
use crate::materialize::{ColumnarBlock, ColumnarResponse, CurrentBlock};
use crate::models::weather::{DAILY_VARIABLES, HOURLY_VARIABLES};
use crate::models::{ForecastQuery, GeocodeCandidate};
use crate::{DashboardError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!("weatherdash/", env!("CARGO_PKG_VERSION"));
const DEFAULT_HOURLY_INTERVAL: i64 = 3600;
const DEFAULT_DAILY_INTERVAL: i64 = 86_400;

/// Place search backend
#[async_trait]
pub trait GeocodingApi: Send + Sync {
    /// Candidates matching a free-text place name, best match first.
    /// An empty list means the provider found nothing.
    async fn search(&self, name: &str) -> Result<Vec<GeocodeCandidate>>;
}

/// Forecast backend
#[async_trait]
pub trait ForecastApi: Send + Sync {
    /// Issue one forecast request for the query
    async fn forecast(&self, query: &ForecastQuery) -> Result<ColumnarResponse>;
}

/// Client for the Open-Meteo geocoding and forecast APIs
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    geocoding_base_url: String,
    forecast_base_url: String,
    max_results: usize,
    language: String,
    geocoding_timeout: Option<Duration>,
}

impl OpenMeteoClient {
    /// Create a new client from the API and search settings
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DashboardError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            geocoding_base_url: config.api.geocoding_base_url.trim_end_matches('/').to_string(),
            forecast_base_url: config.api.forecast_base_url.trim_end_matches('/').to_string(),
            max_results: config.search.max_results,
            language: config.search.language.clone(),
            geocoding_timeout: config.api.geocoding_timeout(),
        })
    }

    fn search_url(&self, name: &str) -> String {
        format!(
            "{}/search?name={}&count={}&language={}",
            self.geocoding_base_url,
            urlencoding::encode(name),
            self.max_results,
            urlencoding::encode(&self.language)
        )
    }

    fn forecast_url(&self, query: &ForecastQuery) -> String {
        format!(
            "{}/forecast?latitude={}&longitude={}&timezone={}&current={}&hourly={}&daily={}&temperature_unit={}&windspeed_unit={}&precipitation_unit={}&timeformat=unixtime",
            self.forecast_base_url,
            query.latitude,
            query.longitude,
            urlencoding::encode(&query.timezone),
            HOURLY_VARIABLES.join(","),
            HOURLY_VARIABLES.join(","),
            DAILY_VARIABLES.join(","),
            query.units.temperature.as_param(),
            query.units.wind_speed.as_param(),
            query.units.precipitation.as_param(),
        )
    }
}

#[async_trait]
impl GeocodingApi for OpenMeteoClient {
    #[instrument(skip(self))]
    async fn search(&self, name: &str) -> Result<Vec<GeocodeCandidate>> {
        let url = self.search_url(name);
        debug!("Geocoding request URL: {}", url);
        let start_time = Instant::now();

        let mut request = self.client.get(&url);
        if let Some(timeout) = self.geocoding_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DashboardError::geocode(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Geocoding API returned status {}", status);
            return Err(DashboardError::geocode(format!(
                "Geocoding API returned status {status}"
            )));
        }

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|e| DashboardError::geocode(format!("Invalid geocoding response: {e}")))?;

        let mut candidates = body.results.unwrap_or_default();
        candidates.truncate(self.max_results);

        info!(
            "Found {} geocoding results for '{}' in {:.3}s",
            candidates.len(),
            name,
            start_time.elapsed().as_secs_f64()
        );
        Ok(candidates)
    }
}

#[async_trait]
impl ForecastApi for OpenMeteoClient {
    #[instrument(skip(self, query), fields(lat = query.latitude, lon = query.longitude, units = %query.units))]
    async fn forecast(&self, query: &ForecastQuery) -> Result<ColumnarResponse> {
        let url = self.forecast_url(query);
        debug!("Forecast request URL: {}", url);
        let start_time = Instant::now();

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);
            let reason = error_reason(&body).unwrap_or("no reason given");
            warn!("Forecast API returned status {}: {}", status, reason);
            return Err(DashboardError::forecast(format!(
                "Forecast API returned status {status}: {reason}"
            )));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| DashboardError::decode(format!("Invalid forecast response: {e}")))?;

        let columnar = parse_forecast_body(body)?;
        info!(
            "Retrieved forecast in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(columnar)
    }
}

/// Geocoding response from Open-Meteo
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<GeocodeCandidate>>,
}

/// Forecast response from Open-Meteo with `timeformat=unixtime`
#[derive(Debug, Deserialize)]
struct WireForecast {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    elevation: Option<f64>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    utc_offset_seconds: i64,
    #[serde(default)]
    current: Option<WireCurrent>,
    #[serde(default)]
    hourly: Option<WireSeries>,
    #[serde(default)]
    daily: Option<WireSeries>,
}

#[derive(Debug, Deserialize)]
struct WireSeries {
    time: Vec<i64>,
    #[serde(flatten)]
    variables: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireCurrent {
    time: i64,
    #[serde(flatten)]
    variables: HashMap<String, Value>,
}

fn error_reason(body: &Value) -> Option<&str> {
    body.get("reason").and_then(Value::as_str)
}

/// Unwrap the response envelope and convert it to columnar form.
///
/// The endpoint answers with one object, or a list of objects when asked
/// for several places; only the first entry is used.
fn parse_forecast_body(body: Value) -> Result<ColumnarResponse> {
    let body = match body {
        Value::Array(entries) => entries
            .into_iter()
            .next()
            .ok_or_else(|| DashboardError::forecast("No response from Open-Meteo"))?,
        other => other,
    };

    if body.get("error").and_then(Value::as_bool) == Some(true) {
        let reason = error_reason(&body).unwrap_or("no reason given").to_string();
        return Err(DashboardError::forecast(reason));
    }

    let wire: WireForecast = serde_json::from_value(body)
        .map_err(|e| DashboardError::decode(format!("Unexpected forecast layout: {e}")))?;

    Ok(ColumnarResponse {
        latitude: wire.latitude,
        longitude: wire.longitude,
        elevation: wire.elevation,
        timezone: wire.timezone,
        utc_offset_seconds: wire.utc_offset_seconds,
        current: wire.current.map(|current| CurrentBlock {
            time: current.time,
            values: HOURLY_VARIABLES
                .iter()
                .map(|name| current.variables.get(*name).and_then(Value::as_f64))
                .collect(),
        }),
        hourly: wire
            .hourly
            .map(|series| columnar_block(&series, &HOURLY_VARIABLES, DEFAULT_HOURLY_INTERVAL)),
        daily: wire
            .daily
            .map(|series| columnar_block(&series, &DAILY_VARIABLES, DEFAULT_DAILY_INTERVAL)),
    })
}

/// Reduce a time array to its start/end/interval triple and pick the value
/// arrays in request order
fn columnar_block(series: &WireSeries, names: &[&str], default_interval: i64) -> ColumnarBlock {
    let start = series.time.first().copied().unwrap_or(0);
    let interval = match series.time.as_slice() {
        [first, second, ..] if second > first => second - first,
        _ => default_interval,
    };
    let samples = i64::try_from(series.time.len()).unwrap_or(0);
    let end = start.saturating_add(samples.saturating_mul(interval));

    ColumnarBlock {
        start,
        end,
        interval,
        variables: names
            .iter()
            .map(|name| series.variables.get(*name).and_then(extract_values))
            .collect(),
    }
}

/// Numeric array with `null` read as `NaN`; any other element fails the
/// whole variable
fn extract_values(value: &Value) -> Option<Vec<f64>> {
    value
        .as_array()?
        .iter()
        .map(|sample| match sample {
            Value::Null => Some(f64::NAN),
            other => other.as_f64(),
        })
        .collect()
}

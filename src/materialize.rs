//! Series materializer
//!
//! Turns the columnar forecast payload (a start/end/interval triple plus one
//! flat value array per requested variable, in request order) into aligned
//! time series. Decoding never fails as a whole: a variable that is missing
//! or has the wrong length becomes an empty series and is only logged.

use crate::models::weather::{CurrentObservation, TimeSeries, code_from_sample, local_instant};
use crate::models::{ForecastMetadata, ForecastResult, UnitPreferences};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One time resolution (hourly or daily) of a columnar response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnarBlock {
    /// First sample, unix seconds
    pub start: i64,
    /// End of the covered range (exclusive), unix seconds
    pub end: i64,
    /// Sampling interval in seconds
    pub interval: i64,
    /// Value arrays by request position; `None` when extraction failed
    pub variables: Vec<Option<Vec<f64>>>,
}

/// Scalar values for a single instant, by request position
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurrentBlock {
    /// Observation time, unix seconds
    pub time: i64,
    pub values: Vec<Option<f64>>,
}

/// A forecast response in columnar form
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnarResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub timezone: Option<String>,
    pub utc_offset_seconds: i64,
    pub current: Option<CurrentBlock>,
    pub hourly: Option<ColumnarBlock>,
    pub daily: Option<ColumnarBlock>,
}

/// Number of samples covered by a block: `floor((end - start) / interval)`,
/// zero for empty or inverted ranges and non-positive intervals.
#[must_use]
pub fn series_length(start: i64, end: i64, interval: i64) -> usize {
    if interval <= 0 || end <= start {
        return 0;
    }
    end.checked_sub(start)
        .map_or(0, |span| usize::try_from(span / interval).unwrap_or(0))
}

/// Reconstruct the sample instants of a block, shifted by the utc offset.
///
/// Returns an empty sequence if any instant falls outside the representable
/// range.
#[must_use]
pub fn materialize_timestamps(
    start: i64,
    end: i64,
    interval: i64,
    utc_offset_seconds: i64,
) -> Vec<DateTime<Utc>> {
    let n = series_length(start, end, interval);
    let timestamps: Option<Vec<DateTime<Utc>>> = (0..n)
        .map(|i| {
            let step = i64::try_from(i).ok()?.checked_mul(interval)?;
            local_instant(start.checked_add(step)?, utc_offset_seconds)
        })
        .collect();

    timestamps.unwrap_or_else(|| {
        warn!(start, end, interval, "Timestamp out of range, dropping series");
        Vec::new()
    })
}

/// Build a time series from a block and the names requested for it.
///
/// `block_name` only labels log events.
#[must_use]
pub fn materialize_series(
    block: Option<&ColumnarBlock>,
    names: &[&str],
    utc_offset_seconds: i64,
    block_name: &str,
) -> TimeSeries {
    let Some(block) = block else {
        debug!("Response has no {} block", block_name);
        return TimeSeries {
            timestamps: Vec::new(),
            values: names.iter().map(|name| (name.to_string(), Vec::new())).collect(),
        };
    };

    let timestamps =
        materialize_timestamps(block.start, block.end, block.interval, utc_offset_seconds);
    let n = timestamps.len();

    let mut values = BTreeMap::new();
    for (index, name) in names.iter().enumerate() {
        let column = match block.variables.get(index) {
            Some(Some(column)) if column.len() == n => column.clone(),
            Some(Some(column)) => {
                warn!(
                    block = block_name,
                    variable = name,
                    expected = n,
                    found = column.len(),
                    "Variable length does not match timestamps, treating as no data"
                );
                Vec::new()
            }
            _ => {
                warn!(
                    block = block_name,
                    variable = name,
                    "Variable missing from response, treating as no data"
                );
                Vec::new()
            }
        };
        values.insert(name.to_string(), column);
    }

    TimeSeries { timestamps, values }
}

/// Decode the current block: six scalars by fixed position plus the instant.
///
/// The observation is dropped when the block is absent or any of the six
/// values is missing.
#[must_use]
pub fn decode_current(
    block: Option<&CurrentBlock>,
    utc_offset_seconds: i64,
) -> Option<CurrentObservation> {
    let block = block?;
    let scalar = |index: usize| block.values.get(index).copied().flatten();

    let observation = (|| {
        Some(CurrentObservation {
            time: local_instant(block.time, utc_offset_seconds)?,
            temperature: scalar(0)?,
            apparent_temperature: scalar(1)?,
            relative_humidity: scalar(2)?,
            precipitation: scalar(3)?,
            weather_code: code_from_sample(scalar(4)?)?,
            wind_speed: scalar(5)?,
        })
    })();

    if observation.is_none() {
        warn!(
            found = block.values.iter().flatten().count(),
            "Current block incomplete, dropping observation"
        );
    }
    observation
}

/// Decode a whole columnar response into a forecast result
#[must_use]
pub fn decode_forecast(
    response: &ColumnarResponse,
    hourly_names: &[&str],
    daily_names: &[&str],
    units: UnitPreferences,
    fetched_at: DateTime<Utc>,
) -> ForecastResult {
    let offset = response.utc_offset_seconds;
    let hourly = materialize_series(response.hourly.as_ref(), hourly_names, offset, "hourly");
    let daily = materialize_series(response.daily.as_ref(), daily_names, offset, "daily");
    let current = decode_current(response.current.as_ref(), offset);

    debug!(
        hourly = hourly.len(),
        daily = daily.len(),
        has_current = current.is_some(),
        "Decoded forecast response"
    );

    ForecastResult {
        metadata: ForecastMetadata {
            latitude: response.latitude,
            longitude: response.longitude,
            elevation: response.elevation,
            timezone: response.timezone.clone(),
            utc_offset_seconds: offset,
        },
        units,
        current,
        hourly,
        daily,
        fetched_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::weather::{DAILY_VARIABLES, HOURLY_VARIABLES};
    use rstest::rstest;

    const START: i64 = 1_700_000_000;

    #[rstest]
    #[case(0, 3600, 3600, 1)]
    #[case(0, 86_400, 3600, 24)]
    #[case(0, 86_399, 3600, 23)]
    #[case(0, 0, 3600, 0)]
    #[case(100, 0, 3600, 0)]
    #[case(0, 7200, 0, 0)]
    #[case(0, 7200, -3600, 0)]
    #[case(START, START + 7 * 86_400, 86_400, 7)]
    fn test_series_length(
        #[case] start: i64,
        #[case] end: i64,
        #[case] interval: i64,
        #[case] expected: usize,
    ) {
        assert_eq!(series_length(start, end, interval), expected);
        assert_eq!(materialize_timestamps(start, end, interval, 0).len(), expected);
    }

    #[test]
    fn test_timestamps_apply_interval_and_offset() {
        let timestamps = materialize_timestamps(START, START + 3 * 3600, 3600, -18_000);
        let secs: Vec<i64> = timestamps.iter().map(DateTime::timestamp).collect();
        assert_eq!(secs, vec![START - 18_000, START - 14_400, START - 10_800]);
    }

    #[test]
    fn test_out_of_range_timestamps_yield_empty_series() {
        assert!(materialize_timestamps(i64::MAX - 10, i64::MAX, 1, 3600).is_empty());
    }

    #[test]
    fn test_missing_and_short_variables_become_empty() {
        let block = ColumnarBlock {
            start: START,
            end: START + 3 * 3600,
            interval: 3600,
            variables: vec![
                Some(vec![10.0, 11.0, 12.0]),
                Some(vec![9.0]),
                None,
            ],
        };

        let series = materialize_series(Some(&block), &HOURLY_VARIABLES, 0, "hourly");
        assert_eq!(series.len(), 3);
        assert_eq!(series.variable("temperature_2m"), &[10.0, 11.0, 12.0]);
        assert!(series.variable("apparent_temperature").is_empty());
        assert!(series.variable("relativehumidity_2m").is_empty());
        // Positions beyond the block's variable list are missing too
        assert!(series.variable("windspeed_10m").is_empty());
        assert_eq!(series.values.len(), HOURLY_VARIABLES.len());
    }

    #[test]
    fn test_absent_block_yields_empty_series() {
        let series = materialize_series(None, &DAILY_VARIABLES, 0, "daily");
        assert!(series.is_empty());
        assert!(series.values.values().all(Vec::is_empty));
    }

    #[test]
    fn test_decode_current_reads_fixed_positions() {
        let block = CurrentBlock {
            time: START,
            values: vec![Some(20.0), Some(18.5), Some(60.0), Some(0.2), Some(61.0), Some(16.09)],
        };
        let current = decode_current(Some(&block), 7200).unwrap();
        assert_eq!(current.time.timestamp(), START + 7200);
        assert_eq!(current.temperature, 20.0);
        assert_eq!(current.apparent_temperature, 18.5);
        assert_eq!(current.relative_humidity, 60.0);
        assert_eq!(current.precipitation, 0.2);
        assert_eq!(current.weather_code, 61);
        assert_eq!(current.wind_speed, 16.09);
    }

    #[test]
    fn test_decode_current_drops_incomplete_block() {
        let block = CurrentBlock {
            time: START,
            values: vec![Some(20.0), None, Some(60.0), Some(0.2), Some(61.0), Some(16.0)],
        };
        assert!(decode_current(Some(&block), 0).is_none());
        assert!(decode_current(None, 0).is_none());
    }

    #[test]
    fn test_decode_forecast_aligns_series() {
        let response = ColumnarResponse {
            latitude: 52.52,
            longitude: 13.42,
            elevation: Some(38.0),
            timezone: Some("Europe/Berlin".to_string()),
            utc_offset_seconds: 3600,
            current: None,
            hourly: Some(ColumnarBlock {
                start: START,
                end: START + 2 * 3600,
                interval: 3600,
                variables: vec![Some(vec![1.0, 2.0]); 6],
            }),
            daily: None,
        };

        let result = decode_forecast(
            &response,
            &HOURLY_VARIABLES,
            &DAILY_VARIABLES,
            UnitPreferences::metric(),
            Utc::now(),
        );
        assert_eq!(result.hourly.len(), 2);
        assert_eq!(
            result.hourly.timestamps.len(),
            result.hourly.variable("temperature_2m").len()
        );
        assert!(result.daily.is_empty());
        assert_eq!(result.metadata.utc_offset_seconds, 3600);
        assert_eq!(result.hourly_points()[1].weather_code, Some(2));
    }
}

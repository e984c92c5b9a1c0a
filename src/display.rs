//! Terminal view of a forecast
//!
//! Builds the current card, the stats cards, the daily list and the hourly
//! list (grouped by day) from a [`ForecastResult`], converting values to the
//! units currently selected. Timestamps are already the location's wall
//! clock, so they are formatted as is.

use crate::convert::{MISSING, display_precipitation, display_temperature, display_wind_speed};
use crate::models::weather::describe_weather_code;
use crate::models::{ForecastResult, Location, UnitPreferences, WeatherCategory};
use chrono::NaiveDate;
use std::fmt;

/// Headline card for the current observation
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentCard {
    pub place: String,
    /// e.g. `Monday, Jan 6, 2025`
    pub date: String,
    pub temperature: String,
    pub category: WeatherCategory,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatCard {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyRow {
    /// Short weekday, e.g. `Tue`
    pub weekday: String,
    pub category: Option<WeatherCategory>,
    pub high: String,
    pub low: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRow {
    /// e.g. `3 PM`
    pub time: String,
    pub category: Option<WeatherCategory>,
    pub temperature: String,
}

/// Hourly rows of one calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyDay {
    pub date: NaiveDate,
    /// Long weekday, e.g. `Tuesday`
    pub name: String,
    pub rows: Vec<HourlyRow>,
}

/// Everything the dashboard shows for one forecast
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub current: Option<CurrentCard>,
    pub stats: Vec<StatCard>,
    pub daily: Vec<DailyRow>,
    pub hourly: Vec<HourlyDay>,
    /// Index into `hourly` of the day being shown
    pub active_day: usize,
}

impl DashboardView {
    /// Build the view. `active_day` is clamped to the available days.
    #[must_use]
    pub fn build(
        location: &Location,
        result: &ForecastResult,
        display: UnitPreferences,
        active_day: usize,
    ) -> Self {
        let measured = result.units;
        let temperature = |value: Option<f64>| {
            value.map_or_else(
                || MISSING.to_string(),
                |v| display_temperature(v, measured.temperature, display.temperature),
            )
        };

        let current = result.current.as_ref().map(|now| CurrentCard {
            place: location.label(),
            date: now.time.format("%A, %b %-d, %Y").to_string(),
            temperature: temperature(Some(now.temperature)),
            category: now.category(),
            description: describe_weather_code(now.weather_code),
        });

        let stats = result
            .current
            .as_ref()
            .map(|now| {
                vec![
                    StatCard {
                        label: "Feels Like",
                        value: temperature(Some(now.apparent_temperature)),
                    },
                    StatCard {
                        label: "Humidity",
                        value: format!("{:.0}%", now.relative_humidity.round()),
                    },
                    StatCard {
                        label: "Wind",
                        value: display_wind_speed(
                            now.wind_speed,
                            measured.wind_speed,
                            display.wind_speed,
                        ),
                    },
                    StatCard {
                        label: "Precipitation",
                        value: display_precipitation(
                            now.precipitation,
                            measured.precipitation,
                            display.precipitation,
                        ),
                    },
                ]
            })
            .unwrap_or_default();

        let daily = result
            .daily_points()
            .into_iter()
            .map(|day| DailyRow {
                weekday: day.date.format("%a").to_string(),
                category: day.weather_code.map(WeatherCategory::from_code),
                high: temperature(day.temperature_max),
                low: temperature(day.temperature_min),
            })
            .collect();

        let mut hourly: Vec<HourlyDay> = Vec::new();
        for point in result.hourly_points() {
            let date = point.time.date_naive();
            let row = HourlyRow {
                time: point.time.format("%-I %p").to_string(),
                category: point.weather_code.map(WeatherCategory::from_code),
                temperature: temperature(point.temperature),
            };
            match hourly.last_mut() {
                Some(day) if day.date == date => day.rows.push(row),
                _ => hourly.push(HourlyDay {
                    date,
                    name: point.time.format("%A").to_string(),
                    rows: vec![row],
                }),
            }
        }

        let active_day = active_day.min(hourly.len().saturating_sub(1));
        Self {
            current,
            stats,
            daily,
            hourly,
            active_day,
        }
    }

    /// Names of the days the hourly list can show
    #[must_use]
    pub fn day_names(&self) -> Vec<&str> {
        self.hourly.iter().map(|day| day.name.as_str()).collect()
    }

    /// Index of the first hourly day with the given name, case-insensitive
    #[must_use]
    pub fn find_day(&self, name: &str) -> Option<usize> {
        self.hourly
            .iter()
            .position(|day| day.name.eq_ignore_ascii_case(name.trim()))
    }
}

fn category_label(category: Option<WeatherCategory>) -> &'static str {
    category.map_or(MISSING, WeatherCategory::label)
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current {
            Some(card) => {
                writeln!(f, "{}", card.place)?;
                writeln!(f, "{}", card.date)?;
                writeln!(f, "  {}  {}", card.temperature, card.description)?;
            }
            None => writeln!(f, "No current conditions available")?,
        }

        if !self.stats.is_empty() {
            let stats: Vec<String> = self
                .stats
                .iter()
                .map(|stat| format!("{} {}", stat.label, stat.value))
                .collect();
            writeln!(f, "{}", stats.join(" | "))?;
        }

        writeln!(f)?;
        writeln!(f, "Daily forecast")?;
        for row in &self.daily {
            writeln!(
                f,
                "  {:<4} {:<14} {:>6} {:>6}",
                row.weekday,
                category_label(row.category),
                row.high,
                row.low
            )?;
        }

        writeln!(f)?;
        let tabs: Vec<String> = self
            .hourly
            .iter()
            .enumerate()
            .map(|(i, day)| {
                if i == self.active_day {
                    format!("[{}]", day.name)
                } else {
                    day.name.clone()
                }
            })
            .collect();
        writeln!(f, "Hourly forecast  {}", tabs.join(" "))?;
        if let Some(day) = self.hourly.get(self.active_day) {
            for row in &day.rows {
                writeln!(
                    f,
                    "  {:>5}  {:<14} {:>6}",
                    row.time,
                    category_label(row.category),
                    row.temperature
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::{ColumnarBlock, ColumnarResponse, CurrentBlock, decode_forecast};
    use crate::models::weather::{DAILY_VARIABLES, HOURLY_VARIABLES};
    use chrono::Utc;

    // Monday, Jan 6, 2025 00:00 UTC
    const MONDAY: i64 = 1_736_121_600;

    fn berlin() -> Location {
        Location {
            name: "Berlin".to_string(),
            latitude: 52.52,
            longitude: 13.41,
            timezone: Some("Europe/Berlin".to_string()),
            country: Some("Germany".to_string()),
            admin_region: Some("Land Berlin".to_string()),
        }
    }

    fn metric_view(active_day: usize) -> DashboardView {
        let metric = UnitPreferences::metric();
        DashboardView::build(&berlin(), &result(metric), metric, active_day)
    }

    fn result(units: UnitPreferences) -> ForecastResult {
        let hours = 30;
        let temperatures: Vec<f64> = (0..hours).map(f64::from).collect();
        let mut hourly_vars = vec![Some(temperatures); 6];
        hourly_vars[4] = Some(vec![61.0; hours as usize]);

        let response = ColumnarResponse {
            latitude: 52.52,
            longitude: 13.41,
            utc_offset_seconds: 0,
            current: Some(CurrentBlock {
                time: MONDAY + 12 * 3600,
                values: vec![Some(20.0), Some(18.4), Some(61.6), Some(0.2), Some(2.0), Some(16.09)],
            }),
            hourly: Some(ColumnarBlock {
                start: MONDAY,
                end: MONDAY + i64::from(hours) * 3600,
                interval: 3600,
                variables: hourly_vars,
            }),
            daily: Some(ColumnarBlock {
                start: MONDAY,
                end: MONDAY + 2 * 86_400,
                interval: 86_400,
                variables: vec![
                    Some(vec![22.0, f64::NAN]),
                    Some(vec![11.6, 9.0]),
                    Some(vec![0.0, 95.0]),
                    None,
                    None,
                ],
            }),
            ..ColumnarResponse::default()
        };
        decode_forecast(&response, &HOURLY_VARIABLES, &DAILY_VARIABLES, units, Utc::now())
    }

    #[test]
    fn test_current_card_and_stats() {
        let view = metric_view(0);

        let card = view.current.as_ref().unwrap();
        assert_eq!(card.place, "Berlin, Land Berlin, Germany");
        assert_eq!(card.date, "Monday, Jan 6, 2025");
        assert_eq!(card.temperature, "20°C");
        assert_eq!(card.category, WeatherCategory::PartlyCloudy);

        let stats: Vec<(&str, &str)> = view
            .stats
            .iter()
            .map(|s| (s.label, s.value.as_str()))
            .collect();
        assert_eq!(
            stats,
            vec![
                ("Feels Like", "18°C"),
                ("Humidity", "62%"),
                ("Wind", "16 km/h"),
                ("Precipitation", "0.2 mm"),
            ]
        );
    }

    #[test]
    fn test_metric_result_shown_in_imperial() {
        let view = DashboardView::build(
            &berlin(),
            &result(UnitPreferences::metric()),
            UnitPreferences::imperial(),
            0,
        );
        assert_eq!(view.current.as_ref().unwrap().temperature, "68°F");
        assert_eq!(view.stats[2].value, "10 mph");
    }

    #[test]
    fn test_daily_rows_mark_missing_values() {
        let view = metric_view(0);
        assert_eq!(view.daily.len(), 2);
        assert_eq!(view.daily[0].weekday, "Mon");
        assert_eq!(view.daily[0].category, Some(WeatherCategory::Clear));
        assert_eq!(view.daily[0].high, "22°C");
        assert_eq!(view.daily[0].low, "12°C");
        assert_eq!(view.daily[1].weekday, "Tue");
        assert_eq!(view.daily[1].high, MISSING);
        assert_eq!(view.daily[1].category, Some(WeatherCategory::Storm));
    }

    #[test]
    fn test_hourly_grouped_by_day() {
        let view = metric_view(0);
        assert_eq!(view.day_names(), vec!["Monday", "Tuesday"]);
        assert_eq!(view.hourly[0].rows.len(), 24);
        assert_eq!(view.hourly[1].rows.len(), 6);
        assert_eq!(view.hourly[0].rows[15].time, "3 PM");
        assert_eq!(view.active_day, 0);
        assert_eq!(view.find_day("tuesday"), Some(1));
        assert_eq!(view.find_day("Friday"), None);

        let clamped = metric_view(9);
        assert_eq!(clamped.active_day, 1);
    }

    #[test]
    fn test_render_marks_active_day() {
        let view = metric_view(1);
        let text = view.to_string();
        assert!(text.contains("Monday, Jan 6, 2025"));
        assert!(text.contains("Hourly forecast  Monday [Tuesday]"));
        assert!(text.contains("Humidity 62%"));
    }
}

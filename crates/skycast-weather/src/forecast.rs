//! Daily and hourly views derived from the 3-hour forecast.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::types::{ForecastData, WeatherCondition};

/// Days shown after today
pub const FORECAST_DAYS: usize = 5;
/// Slots in the hourly strip (3-hour resolution, so 24 hours)
pub const HOURLY_SLOTS: usize = 8;

/// One calendar day of the forecast
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    /// Timestamp of the day's first slot
    pub dt: i64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: f64,
    pub wind: f64,
    pub weather: Option<WeatherCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyTemperature {
    pub dt: i64,
    /// Local `HH:MM`
    pub time: String,
    pub temp: f64,
    pub feels_like: f64,
}

fn city_offset(data: &ForecastData) -> FixedOffset {
    FixedOffset::east_opt(data.city.timezone).unwrap_or_else(|| Utc.fix())
}

fn local_time(dt: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp(dt, 0).map(|utc| utc.with_timezone(&offset))
}

/// Group forecast slots by local calendar day.
///
/// Humidity, wind and condition come from the day's first slot; min/max
/// span every slot of the day.
pub fn daily_forecasts(data: &ForecastData) -> Vec<DailyForecast> {
    let offset = city_offset(data);
    let mut days: BTreeMap<NaiveDate, DailyForecast> = BTreeMap::new();

    for entry in &data.list {
        let Some(local) = local_time(entry.dt, offset) else {
            tracing::debug!(dt = entry.dt, "Skipping forecast slot with invalid timestamp");
            continue;
        };

        days.entry(local.date_naive())
            .and_modify(|day| {
                day.temp_min = day.temp_min.min(entry.main.temp_min);
                day.temp_max = day.temp_max.max(entry.main.temp_max);
            })
            .or_insert_with(|| DailyForecast {
                date: local.date_naive(),
                dt: entry.dt,
                temp_min: entry.main.temp_min,
                temp_max: entry.main.temp_max,
                humidity: entry.main.humidity,
                wind: entry.wind.speed,
                weather: entry.weather.first().cloned(),
            });
    }

    days.into_values().collect()
}

/// The days after the current (partial) one, at most `FORECAST_DAYS`
pub fn next_days(data: &ForecastData) -> Vec<DailyForecast> {
    daily_forecasts(data)
        .into_iter()
        .skip(1)
        .take(FORECAST_DAYS)
        .collect()
}

pub fn hourly_temperatures(data: &ForecastData) -> Vec<HourlyTemperature> {
    let offset = city_offset(data);
    data.list
        .iter()
        .take(HOURLY_SLOTS)
        .filter_map(|entry| {
            let local = local_time(entry.dt, offset)?;
            Some(HourlyTemperature {
                dt: entry.dt,
                time: local.format("%H:%M").to_string(),
                temp: entry.main.temp,
                feels_like: entry.main.feels_like,
            })
        })
        .collect()
}

/// Rounded temperature with a degree sign
pub fn format_temp(temp: f64) -> String {
    let rounded = temp.round();
    // Avoid rendering "-0°"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{}°", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ForecastCity, ForecastEntry, MainReadings, Wind};

    // 2024-03-01T00:00:00Z
    const DAY0: i64 = 1_709_251_200;
    const HOUR: i64 = 3600;

    fn slot(dt: i64, min: f64, max: f64) -> ForecastEntry {
        ForecastEntry {
            dt,
            main: MainReadings {
                temp: (min + max) / 2.0,
                feels_like: (min + max) / 2.0 - 1.0,
                temp_min: min,
                temp_max: max,
                pressure: 1010.0,
                humidity: 50.0,
            },
            weather: vec![WeatherCondition {
                id: 800,
                main: "Clear".into(),
                description: "clear sky".into(),
                icon: "01d".into(),
            }],
            wind: Wind { speed: 3.0, deg: 0.0 },
            dt_txt: String::new(),
        }
    }

    fn forecast(timezone: i32, slots: Vec<ForecastEntry>) -> ForecastData {
        ForecastData {
            list: slots,
            city: ForecastCity {
                timezone,
                ..ForecastCity::default()
            },
        }
    }

    /// Slots every 3 hours starting at 12:00 UTC on day 0
    fn week() -> ForecastData {
        let slots = (0..40)
            .map(|i| {
                let dt = DAY0 + 12 * HOUR + i * 3 * HOUR;
                slot(dt, 10.0 + (i % 8) as f64, 12.0 + (i % 5) as f64)
            })
            .collect();
        forecast(0, slots)
    }

    #[test]
    fn test_one_summary_per_day_with_ordered_extremes() {
        let days = daily_forecasts(&week());
        // 12:00 on day 0 through 09:00 on day 5
        assert_eq!(days.len(), 6);
        for day in &days {
            assert!(day.temp_min <= day.temp_max, "{:?}", day);
        }
        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn test_min_max_span_whole_day() {
        let data = forecast(
            0,
            vec![
                slot(DAY0, 5.0, 9.0),
                slot(DAY0 + 3 * HOUR, 2.0, 7.0),
                slot(DAY0 + 6 * HOUR, 4.0, 14.0),
                slot(DAY0 + 24 * HOUR, 1.0, 3.0),
            ],
        );
        let days = daily_forecasts(&data);
        assert_eq!(days.len(), 2);
        assert_eq!((days[0].temp_min, days[0].temp_max), (2.0, 14.0));
        assert_eq!(days[0].dt, DAY0);
        assert_eq!((days[1].temp_min, days[1].temp_max), (1.0, 3.0));
    }

    #[test]
    fn test_next_days_skips_today_and_caps_at_five() {
        let days = next_days(&week());
        assert_eq!(days.len(), FORECAST_DAYS);
        let today = daily_forecasts(&week())[0].date;
        assert!(days.iter().all(|d| d.date != today));
    }

    #[test]
    fn test_grouping_uses_city_offset() {
        // 20:00 and 22:00 UTC straddle midnight at UTC+3
        let data = forecast(
            3 * 3600,
            vec![slot(DAY0 + 20 * HOUR, 1.0, 2.0), slot(DAY0 + 22 * HOUR, 3.0, 4.0)],
        );
        let days = daily_forecasts(&data);
        assert_eq!(days.len(), 2);

        let utc = forecast(0, data.list.clone());
        assert_eq!(daily_forecasts(&utc).len(), 1);
    }

    #[test]
    fn test_hourly_takes_first_eight_slots() {
        let hourly = hourly_temperatures(&week());
        assert_eq!(hourly.len(), HOURLY_SLOTS);
        assert_eq!(hourly[0].time, "12:00");
        assert_eq!(hourly[1].time, "15:00");
    }

    #[test]
    fn test_empty_forecast() {
        let data = forecast(0, Vec::new());
        assert!(daily_forecasts(&data).is_empty());
        assert!(next_days(&data).is_empty());
    }

    #[test]
    fn test_format_temp_rounds() {
        assert_eq!(format_temp(21.6), "22°");
        assert_eq!(format_temp(-0.4), "0°");
        assert_eq!(format_temp(-3.5), "-4°");
    }
}

//! Weather entity: current conditions plus daily and hourly forecasts.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use super::{number_at, str_at};
use crate::api::UnitSystem;
use crate::coordinator::Snapshot;
use crate::settings::{location_slug, location_title, WeatherSettings};

/// Google condition types and the conditions they map to.
const CONDITION_MAP: &[(&str, &str)] = &[
    ("CLEAR", "sunny"),
    ("MOSTLY_CLEAR", "sunny"),
    ("PARTLY_CLOUDY", "partlycloudy"),
    ("PARTLY_CLEAR", "partlycloudy"),
    ("MOSTLY_CLOUDY", "cloudy"),
    ("CLOUDY", "cloudy"),
    ("OVERCAST", "cloudy"),
    ("FOG", "fog"),
    ("LIGHT_RAIN", "rainy"),
    ("RAIN", "rainy"),
    ("HEAVY_RAIN", "pouring"),
    ("RAIN_SHOWERS", "rainy"),
    ("SCATTERED_SHOWERS", "rainy"),
    ("DRIZZLE", "rainy"),
    ("LIGHT_SNOW", "snowy"),
    ("SNOW", "snowy"),
    ("HEAVY_SNOW", "snowy"),
    ("SNOW_SHOWERS", "snowy"),
    ("BLIZZARD", "snowy"),
    ("SLEET", "snowy-rainy"),
    ("HAIL", "hail"),
    ("THUNDERSTORM", "lightning"),
    ("SEVERE_THUNDERSTORM", "lightning-rainy"),
    ("TORNADO", "exceptional"),
    ("HURRICANE", "hurricane"),
    ("TROPICAL_STORM", "hurricane"),
    ("WINDY", "windy"),
];

/// Map a Google condition type. Unmapped types are lowercased.
pub fn map_condition(condition_type: &str) -> String {
    CONDITION_MAP
        .iter()
        .find(|(google, _)| *google == condition_type)
        .map(|(_, mapped)| mapped.to_string())
        .unwrap_or_else(|| condition_type.to_lowercase())
}

fn condition_of(value: &Value) -> Option<String> {
    str_at(value, &["weatherCondition", "type"])
        .filter(|t| !t.is_empty())
        .map(map_condition)
}

/// Native units of a weather entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherUnits {
    pub temperature: &'static str,
    pub pressure: &'static str,
    pub wind_speed: &'static str,
    pub precipitation: &'static str,
    pub visibility: &'static str,
}

impl WeatherUnits {
    pub fn for_system(units: UnitSystem) -> Self {
        match units {
            UnitSystem::Imperial => Self {
                temperature: "°F",
                pressure: "mbar",
                wind_speed: "mph",
                precipitation: "in",
                visibility: "mi",
            },
            UnitSystem::Metric => Self {
                temperature: "°C",
                pressure: "mbar",
                wind_speed: "km/h",
                precipitation: "mm",
                visibility: "km",
            },
        }
    }
}

/// A single forecast entry (daily or hourly).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Forecast {
    pub datetime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparent_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_bearing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_gust_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_coverage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f64>,
}

fn display_date(day: &Value) -> Option<String> {
    let year = number_at(day, &["displayDate", "year"])? as i32;
    let month = number_at(day, &["displayDate", "month"])? as u32;
    let dom = number_at(day, &["displayDate", "day"])? as u32;
    NaiveDate::from_ymd_opt(year, month, dom).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Build daily forecasts. Days without a valid display date are skipped.
pub fn daily_forecasts(days: &[Value]) -> Vec<Forecast> {
    days.iter()
        .filter_map(|day| {
            let datetime = display_date(day)?;
            let daytime = value_of(day, "daytimeForecast");

            Some(Forecast {
                datetime,
                condition: daytime.and_then(condition_of),
                temperature: number_at(day, &["maxTemperature", "degrees"]),
                templow: number_at(day, &["minTemperature", "degrees"]),
                precipitation: daytime.and_then(|d| number_at(d, &["precipitation", "qpf", "quantity"])),
                precipitation_probability: daytime
                    .and_then(|d| number_at(d, &["precipitation", "probability", "percent"])),
                wind_speed: daytime.and_then(|d| number_at(d, &["wind", "speed", "value"])),
                wind_bearing: daytime.and_then(|d| number_at(d, &["wind", "direction", "degrees"])),
                humidity: daytime.and_then(|d| number_at(d, &["relativeHumidity"])),
                uv_index: daytime.and_then(|d| number_at(d, &["uvIndex"])),
                cloud_coverage: daytime.and_then(|d| number_at(d, &["cloudCover"])),
                ..Default::default()
            })
        })
        .collect()
}

/// Build hourly forecasts. Hours without a parseable start time are skipped.
pub fn hourly_forecasts(hours: &[Value]) -> Vec<Forecast> {
    hours
        .iter()
        .filter_map(|hour| {
            let start = str_at(hour, &["interval", "startTime"])?;
            let datetime = match DateTime::parse_from_rfc3339(start) {
                Ok(dt) => dt.to_rfc3339(),
                Err(e) => {
                    tracing::debug!("Skipping hourly forecast with start time {:?}: {}", start, e);
                    return None;
                }
            };

            Some(Forecast {
                datetime,
                condition: condition_of(hour),
                temperature: number_at(hour, &["temperature", "degrees"]),
                apparent_temperature: number_at(hour, &["feelsLikeTemperature", "degrees"]),
                precipitation: number_at(hour, &["precipitation", "qpf", "quantity"]),
                precipitation_probability: number_at(hour, &["precipitation", "probability", "percent"]),
                wind_speed: number_at(hour, &["wind", "speed", "value"]),
                wind_bearing: number_at(hour, &["wind", "direction", "degrees"]),
                wind_gust_speed: number_at(hour, &["wind", "gust", "value"]),
                humidity: number_at(hour, &["relativeHumidity"]),
                pressure: number_at(hour, &["airPressure", "meanSeaLevelMillibars"]),
                uv_index: number_at(hour, &["uvIndex"]),
                cloud_coverage: number_at(hour, &["cloudCover"]),
                ..Default::default()
            })
        })
        .collect()
}

fn value_of<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| v.is_object())
}

/// The weather entity as exposed over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherView {
    pub unique_id: String,
    pub name: String,
    pub condition: Option<String>,
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub dew_point: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_bearing: Option<f64>,
    pub wind_gust_speed: Option<f64>,
    pub visibility: Option<f64>,
    pub cloud_coverage: Option<f64>,
    pub uv_index: Option<f64>,
    pub units: WeatherUnits,
    pub forecast_daily: Vec<Forecast>,
    pub forecast_hourly: Vec<Forecast>,
}

/// Render the weather entity. Disabled forecasts are always empty.
pub fn render_weather(settings: &WeatherSettings, snapshot: Option<&Snapshot>) -> WeatherView {
    let current = snapshot.and_then(Snapshot::current);
    let field = |keys: &[&str]| current.and_then(|c| number_at(c, keys));

    let forecast_daily = match snapshot {
        Some(s) if settings.include_daily_forecast => daily_forecasts(s.daily_forecast()),
        _ => Vec::new(),
    };
    let forecast_hourly = match snapshot {
        Some(s) if settings.include_hourly_forecast => hourly_forecasts(s.hourly_forecast()),
        _ => Vec::new(),
    };

    WeatherView {
        unique_id: format!("{}_weather", location_slug(&settings.location)),
        name: format!("{} Weather", location_title(&settings.location)),
        condition: current.and_then(condition_of),
        temperature: field(&["temperature", "degrees"]),
        apparent_temperature: field(&["feelsLikeTemperature", "degrees"]),
        dew_point: field(&["dewPoint", "degrees"]),
        humidity: field(&["relativeHumidity"]),
        pressure: field(&["airPressure", "meanSeaLevelMillibars"]),
        wind_speed: field(&["wind", "speed", "value"]),
        wind_bearing: field(&["wind", "direction", "degrees"]),
        wind_gust_speed: field(&["wind", "gust", "value"]),
        visibility: field(&["visibility", "distance"]),
        cloud_coverage: field(&["cloudCover"]),
        uv_index: field(&["uvIndex"]),
        units: WeatherUnits::for_system(settings.unit_system),
        forecast_daily,
        forecast_hourly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{EndpointCache, EndpointKind, PartialPayloads};
    use crate::settings::{EntryData, EntryOptions};
    use chrono::Local;
    use serde_json::json;

    fn settings(options: EntryOptions) -> WeatherSettings {
        let data: EntryData = serde_json::from_value(json!({
            "api_key": "key",
            "location": "cabin",
            "latitude": 46.5,
            "longitude": 7.9,
            "unit_system": "IMPERIAL"
        }))
        .unwrap();
        WeatherSettings::merge(&data, &options).unwrap()
    }

    fn snapshot() -> Snapshot {
        let mut fresh = PartialPayloads::new();
        fresh.insert(
            EndpointKind::Current,
            json!({
                "temperature": {"degrees": 61.0},
                "weatherCondition": {"type": "HEAVY_RAIN"},
                "wind": {"speed": {"value": 9}, "direction": {"degrees": 180}}
            }),
        );
        fresh.insert(
            EndpointKind::Daily,
            json!([
                {
                    "displayDate": {"year": 2024, "month": 6, "day": 5},
                    "maxTemperature": {"degrees": 70.1},
                    "minTemperature": {"degrees": 50.4},
                    "daytimeForecast": {
                        "weatherCondition": {"type": "PARTLY_CLOUDY"},
                        "precipitation": {"probability": {"percent": 20}}
                    }
                },
                {"maxTemperature": {"degrees": 71.0}}
            ]),
        );
        fresh.insert(
            EndpointKind::Hourly,
            json!([
                {"interval": {"startTime": "2024-06-05T13:00:00Z"}, "temperature": {"degrees": 64}},
                {"interval": {"startTime": "not a time"}},
                {"temperature": {"degrees": 60}}
            ]),
        );
        EndpointCache::new().reconcile(fresh, Local::now())
    }

    #[test]
    fn test_map_condition() {
        assert_eq!(map_condition("CLEAR"), "sunny");
        assert_eq!(map_condition("HEAVY_RAIN"), "pouring");
        assert_eq!(map_condition("SEVERE_THUNDERSTORM"), "lightning-rainy");
        assert_eq!(map_condition("VOLCANIC_ASH"), "volcanic_ash");
    }

    #[test]
    fn test_render_weather() {
        let snapshot = snapshot();
        let view = render_weather(&settings(EntryOptions::default()), Some(&snapshot));

        assert_eq!(view.unique_id, "cabin_weather");
        assert_eq!(view.name, "Cabin Weather");
        assert_eq!(view.condition.as_deref(), Some("pouring"));
        assert_eq!(view.temperature, Some(61.0));
        assert_eq!(view.wind_bearing, Some(180.0));
        assert_eq!(view.humidity, None);
        assert_eq!(view.units.temperature, "°F");
        assert_eq!(view.units.pressure, "mbar");

        assert_eq!(view.forecast_daily.len(), 1);
        let day = &view.forecast_daily[0];
        assert_eq!(day.datetime, "2024-06-05");
        assert_eq!(day.condition.as_deref(), Some("partlycloudy"));
        assert_eq!(day.temperature, Some(70.1));
        assert_eq!(day.templow, Some(50.4));
        assert_eq!(day.precipitation_probability, Some(20.0));

        assert_eq!(view.forecast_hourly.len(), 1);
        assert_eq!(view.forecast_hourly[0].datetime, "2024-06-05T13:00:00+00:00");
        assert_eq!(view.forecast_hourly[0].temperature, Some(64.0));
    }

    #[test]
    fn test_disabled_forecasts_are_empty() {
        let options = EntryOptions {
            include_daily_forecast: Some(false),
            include_hourly_forecast: Some(false),
            ..Default::default()
        };
        let snapshot = snapshot();
        let view = render_weather(&settings(options), Some(&snapshot));
        assert!(view.forecast_daily.is_empty());
        assert!(view.forecast_hourly.is_empty());
        assert_eq!(view.temperature, Some(61.0));
    }

    #[test]
    fn test_no_snapshot() {
        let view = render_weather(&settings(EntryOptions::default()), None);
        assert_eq!(view.condition, None);
        assert!(view.forecast_daily.is_empty());
    }

    #[test]
    fn test_forecast_serialization_skips_missing() {
        let forecast = Forecast {
            datetime: "2024-06-05".to_string(),
            temperature: Some(20.0),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&forecast).unwrap(),
            json!({"datetime": "2024-06-05", "temperature": 20.0})
        );
    }
}

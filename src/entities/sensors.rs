//! Observational sensors backed by current conditions.

use serde::Serialize;
use serde_json::Value;

use super::{attributes, value_at, Attributes};
use crate::api::UnitSystem;
use crate::coordinator::Snapshot;
use crate::settings::location_slug;

/// Kind of quantity a sensor reports; decides its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Temperature,
    Percentage,
    Pressure,
    Speed,
    Distance,
    Precipitation,
    UvIndex,
    Text,
}

impl Measurement {
    /// Unit the API reports this quantity in for the given unit system.
    pub fn unit(&self, units: UnitSystem) -> Option<&'static str> {
        let imperial = units == UnitSystem::Imperial;
        match self {
            Measurement::Temperature => Some(if imperial { "°F" } else { "°C" }),
            Measurement::Percentage => Some("%"),
            // Pressure is not converted by the API.
            Measurement::Pressure => Some("mbar"),
            Measurement::Speed => Some(if imperial { "mph" } else { "km/h" }),
            Measurement::Distance => Some(if imperial { "mi" } else { "km" }),
            Measurement::Precipitation => Some(if imperial { "in" } else { "mm" }),
            Measurement::UvIndex => Some("UV index"),
            Measurement::Text => None,
        }
    }
}

/// Describes one sensor.
#[derive(Clone)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub measurement: Measurement,
    pub icon: Option<&'static str>,
    pub value_fn: fn(&Snapshot) -> Option<Value>,
    pub attributes_fn: Option<fn(&Snapshot) -> Attributes>,
}

/// Rendered state of one sensor.
#[derive(Debug, Clone, Serialize)]
pub struct SensorState {
    pub unique_id: String,
    pub key: &'static str,
    pub name: &'static str,
    pub state: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    pub attributes: Attributes,
}

/// Leaf of the current-conditions payload.
fn current(snapshot: &Snapshot, keys: &[&str]) -> Option<Value> {
    snapshot.current().and_then(|c| value_at(c, keys)).cloned()
}

/// All observational sensors.
pub fn sensor_types() -> Vec<SensorDescription> {
    vec![
        SensorDescription {
            key: "temperature",
            name: "Temperature",
            measurement: Measurement::Temperature,
            icon: None,
            value_fn: |s| current(s, &["temperature", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "feels_like",
            name: "Feels Like Temperature",
            measurement: Measurement::Temperature,
            icon: None,
            value_fn: |s| current(s, &["feelsLikeTemperature", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "dew_point",
            name: "Dew Point",
            measurement: Measurement::Temperature,
            icon: None,
            value_fn: |s| current(s, &["dewPoint", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "heat_index",
            name: "Heat Index",
            measurement: Measurement::Temperature,
            icon: None,
            value_fn: |s| current(s, &["heatIndex", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "wind_chill",
            name: "Wind Chill",
            measurement: Measurement::Temperature,
            icon: None,
            value_fn: |s| current(s, &["windChill", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "humidity",
            name: "Humidity",
            measurement: Measurement::Percentage,
            icon: None,
            value_fn: |s| current(s, &["relativeHumidity"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "pressure",
            name: "Pressure",
            measurement: Measurement::Pressure,
            icon: None,
            value_fn: |s| current(s, &["airPressure", "meanSeaLevelMillibars"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "wind_speed",
            name: "Wind Speed",
            measurement: Measurement::Speed,
            icon: Some("mdi:weather-windy"),
            value_fn: |s| current(s, &["wind", "speed", "value"]),
            attributes_fn: Some(|s: &Snapshot| {
                attributes([
                    ("direction", current(s, &["wind", "direction", "degrees"])),
                    ("cardinal", current(s, &["wind", "direction", "cardinal"])),
                ])
            }),
        },
        SensorDescription {
            key: "wind_gust",
            name: "Wind Gust",
            measurement: Measurement::Speed,
            icon: Some("mdi:weather-windy-variant"),
            value_fn: |s| current(s, &["wind", "gust", "value"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "wind_direction",
            name: "Wind Direction",
            measurement: Measurement::Text,
            icon: Some("mdi:compass"),
            value_fn: |s| current(s, &["wind", "direction", "cardinal"]),
            attributes_fn: Some(|s: &Snapshot| {
                attributes([("degrees", current(s, &["wind", "direction", "degrees"]))])
            }),
        },
        SensorDescription {
            key: "visibility",
            name: "Visibility",
            measurement: Measurement::Distance,
            icon: Some("mdi:eye"),
            value_fn: |s| current(s, &["visibility", "distance"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "cloud_cover",
            name: "Cloud Cover",
            measurement: Measurement::Percentage,
            icon: Some("mdi:cloud-percent"),
            value_fn: |s| current(s, &["cloudCover"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "uv_index",
            name: "UV Index",
            measurement: Measurement::UvIndex,
            icon: Some("mdi:weather-sunny-alert"),
            value_fn: |s| current(s, &["uvIndex"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "precipitation_probability",
            name: "Precipitation Probability",
            measurement: Measurement::Percentage,
            icon: Some("mdi:water-percent"),
            value_fn: |s| current(s, &["precipitation", "probability", "percent"]),
            attributes_fn: Some(|s: &Snapshot| {
                attributes([("type", current(s, &["precipitation", "probability", "type"]))])
            }),
        },
        SensorDescription {
            key: "precipitation_amount",
            name: "Precipitation Amount",
            measurement: Measurement::Precipitation,
            icon: Some("mdi:weather-rainy"),
            value_fn: |s| current(s, &["precipitation", "qpf", "quantity"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "thunderstorm_probability",
            name: "Thunderstorm Probability",
            measurement: Measurement::Percentage,
            icon: Some("mdi:weather-lightning"),
            value_fn: |s| current(s, &["thunderstormProbability"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "temp_change_24h",
            name: "Temperature Change (24h)",
            measurement: Measurement::Temperature,
            icon: Some("mdi:thermometer-chevron-up"),
            value_fn: |s| current(s, &["currentConditionsHistory", "temperatureChange", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "max_temp_24h",
            name: "Max Temperature (24h)",
            measurement: Measurement::Temperature,
            icon: Some("mdi:thermometer-high"),
            value_fn: |s| current(s, &["currentConditionsHistory", "maxTemperature", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "min_temp_24h",
            name: "Min Temperature (24h)",
            measurement: Measurement::Temperature,
            icon: Some("mdi:thermometer-low"),
            value_fn: |s| current(s, &["currentConditionsHistory", "minTemperature", "degrees"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "precipitation_24h",
            name: "Precipitation (24h)",
            measurement: Measurement::Precipitation,
            icon: Some("mdi:weather-pouring"),
            value_fn: |s| current(s, &["currentConditionsHistory", "qpf", "quantity"]),
            attributes_fn: None,
        },
        SensorDescription {
            key: "weather_condition",
            name: "Weather Condition",
            measurement: Measurement::Text,
            icon: Some("mdi:weather-partly-cloudy"),
            value_fn: |s| current(s, &["weatherCondition", "description", "text"]),
            attributes_fn: Some(|s: &Snapshot| {
                attributes([
                    ("type", current(s, &["weatherCondition", "type"])),
                    ("icon", current(s, &["weatherCondition", "iconBaseUri"])),
                    ("is_daytime", current(s, &["isDaytime"])),
                ])
            }),
        },
    ]
}

/// Render every sensor for a location. Values are `None` until the first snapshot.
pub fn render_sensors(
    location: &str,
    snapshot: Option<&Snapshot>,
    units: UnitSystem,
) -> Vec<SensorState> {
    let slug = location_slug(location);

    sensor_types()
        .into_iter()
        .map(|desc| {
            let state = snapshot.and_then(desc.value_fn);
            let attributes = match (snapshot, desc.attributes_fn) {
                (Some(s), Some(f)) => f(s),
                _ => Attributes::new(),
            };

            SensorState {
                unique_id: format!("{}_{}", slug, desc.key),
                key: desc.key,
                name: desc.name,
                state,
                unit: desc.measurement.unit(units),
                icon: desc.icon,
                attributes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{EndpointCache, EndpointKind, PartialPayloads};
    use chrono::Local;
    use serde_json::json;

    fn snapshot() -> Snapshot {
        let mut fresh = PartialPayloads::new();
        fresh.insert(
            EndpointKind::Current,
            json!({
                "isDaytime": false,
                "temperature": {"degrees": 18.2},
                "relativeHumidity": 71,
                "wind": {
                    "speed": {"value": 14},
                    "direction": {"degrees": 300, "cardinal": "WEST_NORTHWEST"}
                },
                "weatherCondition": {"type": "CLOUDY", "description": {"text": "Cloudy"}}
            }),
        );
        EndpointCache::new().reconcile(fresh, Local::now())
    }

    fn find<'a>(sensors: &'a [SensorState], key: &str) -> &'a SensorState {
        sensors.iter().find(|s| s.key == key).unwrap()
    }

    #[test]
    fn test_sensor_values() {
        let snapshot = snapshot();
        let sensors = render_sensors("Back Yard", Some(&snapshot), UnitSystem::Metric);
        assert_eq!(sensors.len(), sensor_types().len());

        let temperature = find(&sensors, "temperature");
        assert_eq!(temperature.state, Some(json!(18.2)));
        assert_eq!(temperature.unit, Some("°C"));
        assert_eq!(temperature.unique_id, "back_yard_temperature");

        let wind = find(&sensors, "wind_speed");
        assert_eq!(wind.state, Some(json!(14)));
        assert_eq!(wind.attributes["cardinal"], json!("WEST_NORTHWEST"));

        let condition = find(&sensors, "weather_condition");
        assert_eq!(condition.state, Some(json!("Cloudy")));
        assert_eq!(condition.attributes["is_daytime"], json!(false));
        assert!(!condition.attributes.contains_key("icon"));

        assert_eq!(find(&sensors, "heat_index").state, None);
    }

    #[test]
    fn test_imperial_units() {
        let sensors = render_sensors("home", None, UnitSystem::Imperial);
        assert_eq!(find(&sensors, "temperature").unit, Some("°F"));
        assert_eq!(find(&sensors, "wind_speed").unit, Some("mph"));
        assert_eq!(find(&sensors, "pressure").unit, Some("mbar"));
        assert_eq!(find(&sensors, "wind_direction").unit, None);
    }

    #[test]
    fn test_no_snapshot_means_unknown() {
        let sensors = render_sensors("home", None, UnitSystem::Metric);
        assert!(sensors.iter().all(|s| s.state.is_none() && s.attributes.is_empty()));
    }

    #[test]
    fn test_sensor_keys_are_unique() {
        let mut keys: Vec<_> = sensor_types().iter().map(|d| d.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), sensor_types().len());
    }
}

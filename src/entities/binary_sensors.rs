//! Alert binary sensors.

use serde::Serialize;
use serde_json::{json, Value};

use super::{attributes, str_at, value_at, Attributes};
use crate::coordinator::Snapshot;
use crate::settings::location_slug;

const SEVERE_SEVERITIES: [&str; 2] = ["EXTREME", "SEVERE"];
const URGENT_URGENCIES: [&str; 2] = ["IMMEDIATE", "EXPECTED"];

/// Describes one binary sensor. Both functions receive the alert list.
#[derive(Clone)]
pub struct BinarySensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub value_fn: fn(&[Value]) -> bool,
    pub attributes_fn: fn(&[Value]) -> Attributes,
}

/// Rendered state of one binary sensor.
#[derive(Debug, Clone, Serialize)]
pub struct BinarySensorState {
    pub unique_id: String,
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub is_on: bool,
    pub attributes: Attributes,
}

fn is_severe(alert: &Value) -> bool {
    str_at(alert, &["severity"]).is_some_and(|s| SEVERE_SEVERITIES.contains(&s))
}

fn is_urgent(alert: &Value) -> bool {
    str_at(alert, &["urgency"]).is_some_and(|u| URGENT_URGENCIES.contains(&u))
}

pub fn has_alerts(alerts: &[Value]) -> bool {
    !alerts.is_empty()
}

pub fn has_severe_alerts(alerts: &[Value]) -> bool {
    alerts.iter().any(is_severe)
}

pub fn has_urgent_alerts(alerts: &[Value]) -> bool {
    alerts.iter().any(is_urgent)
}

/// Rank of a severity level; unknown levels rank lowest.
fn severity_rank(severity: &str) -> u8 {
    match severity {
        "EXTREME" => 4,
        "SEVERE" => 3,
        "MODERATE" => 2,
        "MINOR" => 1,
        _ => 0,
    }
}

/// Highest severity among `alerts`.
pub fn max_severity(alerts: &[Value]) -> Option<&str> {
    alerts
        .iter()
        .filter_map(|a| str_at(a, &["severity"]))
        .max_by_key(|s| severity_rank(s))
}

fn alert_detail(alert: &Value, with_description: bool) -> Value {
    let field = |keys: &[&str]| value_at(alert, keys).cloned();
    let mut pairs = vec![
        ("alert_id", field(&["alertId"])),
        ("title", field(&["alertTitle", "text"])),
        ("event_type", field(&["eventType"])),
        ("area", field(&["areaName"])),
        ("severity", field(&["severity"])),
        ("certainty", field(&["certainty"])),
        ("urgency", field(&["urgency"])),
        ("start_time", field(&["startTime"])),
        ("expiration_time", field(&["expirationTime"])),
    ];
    if with_description {
        pairs.push(("description", field(&["description"])));
    }
    pairs.push(("instruction", field(&["instruction"])));

    Value::Object(attributes(pairs))
}

pub fn alert_attributes(alerts: &[Value]) -> Attributes {
    if alerts.is_empty() {
        return attributes([("alert_count", Some(json!(0)))]);
    }

    let details: Vec<Value> = alerts.iter().map(|a| alert_detail(a, true)).collect();
    attributes([
        ("alert_count", Some(json!(alerts.len()))),
        ("alerts", Some(Value::Array(details))),
        ("max_severity", max_severity(alerts).map(|s| json!(s))),
        ("data_source", value_at(&alerts[0], &["dataSource", "name"]).cloned()),
    ])
}

pub fn severe_alert_attributes(alerts: &[Value]) -> Attributes {
    let details: Vec<Value> = alerts
        .iter()
        .filter(|a| is_severe(a))
        .map(|a| alert_detail(a, false))
        .collect();

    if details.is_empty() {
        return attributes([("alert_count", Some(json!(0)))]);
    }
    attributes([
        ("alert_count", Some(json!(details.len()))),
        ("alerts", Some(Value::Array(details))),
    ])
}

pub fn urgent_alert_attributes(alerts: &[Value]) -> Attributes {
    let urgent: Vec<Value> = alerts
        .iter()
        .filter(|a| is_urgent(a))
        .map(|a| {
            Value::Object(attributes([
                ("title", value_at(a, &["alertTitle", "text"]).cloned()),
                ("urgency", value_at(a, &["urgency"]).cloned()),
                ("instruction", value_at(a, &["instruction"]).cloned()),
            ]))
        })
        .collect();

    if urgent.is_empty() {
        return Attributes::new();
    }
    attributes([("urgent_alerts", Some(Value::Array(urgent)))])
}

pub fn binary_sensor_types() -> Vec<BinarySensorDescription> {
    vec![
        BinarySensorDescription {
            key: "weather_alert",
            name: "Weather Alert",
            icon: "mdi:alert",
            value_fn: has_alerts,
            attributes_fn: alert_attributes,
        },
        BinarySensorDescription {
            key: "severe_weather_alert",
            name: "Severe Weather Alert",
            icon: "mdi:alert-circle",
            value_fn: has_severe_alerts,
            attributes_fn: severe_alert_attributes,
        },
        BinarySensorDescription {
            key: "urgent_weather_alert",
            name: "Urgent Weather Alert",
            icon: "mdi:alert-octagon",
            value_fn: has_urgent_alerts,
            attributes_fn: urgent_alert_attributes,
        },
    ]
}

/// Render the alert sensors for a location.
///
/// Locations where the alerts endpoint returned 404 get no binary sensors.
pub fn render_binary_sensors(
    location: &str,
    snapshot: Option<&Snapshot>,
    alerts_supported: Option<bool>,
) -> Vec<BinarySensorState> {
    if alerts_supported == Some(false) {
        tracing::debug!("Alerts not supported for {}, skipping binary sensors", location);
        return Vec::new();
    }

    let slug = location_slug(location);
    let alerts = snapshot.map(Snapshot::alerts).unwrap_or(&[]);

    binary_sensor_types()
        .into_iter()
        .map(|desc| BinarySensorState {
            unique_id: format!("{}_{}", slug, desc.key),
            key: desc.key,
            name: desc.name,
            icon: desc.icon,
            is_on: (desc.value_fn)(alerts),
            attributes: (desc.attributes_fn)(alerts),
        })
        .collect()
}

//! Presentation views over coordinator snapshots.
//!
//! Sensors and binary sensors are driven by static description tables: each
//! description pairs a key with plain functions that pull a value and an
//! attribute map out of a snapshot.

mod binary_sensors;
mod sensors;
mod weather;

pub use binary_sensors::*;
pub use sensors::*;
pub use weather::*;

use serde_json::{Map, Value};

/// Attribute map attached to an entity.
pub type Attributes = Map<String, Value>;

/// Walk nested object keys. Returns `None` if a key is missing or the leaf is
/// itself an object.
pub fn value_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in keys {
        current = current.as_object()?.get(*key)?;
    }
    match current {
        Value::Object(_) | Value::Null => None,
        leaf => Some(leaf),
    }
}

/// Numeric leaf at `keys`.
pub fn number_at(value: &Value, keys: &[&str]) -> Option<f64> {
    value_at(value, keys).and_then(Value::as_f64)
}

/// String leaf at `keys`.
pub fn str_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    value_at(value, keys).and_then(Value::as_str)
}

/// Build an attribute map, dropping absent values.
pub fn attributes<I>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (&'static str, Option<Value>)>,
{
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
}

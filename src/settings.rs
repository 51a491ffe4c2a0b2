//! Per-entry weather settings.
//!
//! An entry stores its setup data and an options layer. Options override data
//! field by field, and the merged [`WeatherSettings`] is recomputed whenever
//! either layer changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{Coordinates, UnitSystem};
use crate::coordinator::{
    validate_interval, EndpointKind, IntervalTable, NightWindow, ScheduleError,
    DEFAULT_NIGHT_END, DEFAULT_NIGHT_START,
};

/// Settings error types.
#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    #[error("invalid latitude {0}: must be within -90..=90")]
    InvalidLatitude(f64),
    #[error("invalid longitude {0}: must be within -180..=180")]
    InvalidLongitude(f64),
    #[error("invalid {key}: {source}")]
    InvalidInterval { key: String, source: ScheduleError },
    #[error("invalid night window: {0}")]
    InvalidNightWindow(ScheduleError),
}

/// Optional per-endpoint interval overrides, flattened into both layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_day_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_night_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_day_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_night_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_day_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_night_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts_day_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts_night_interval: Option<u32>,
}

impl IntervalOverrides {
    fn pair(&self, endpoint: EndpointKind) -> (Option<u32>, Option<u32>) {
        match endpoint {
            EndpointKind::Current => (self.current_day_interval, self.current_night_interval),
            EndpointKind::Daily => (self.daily_day_interval, self.daily_night_interval),
            EndpointKind::Hourly => (self.hourly_day_interval, self.hourly_night_interval),
            EndpointKind::Alerts => (self.alerts_day_interval, self.alerts_night_interval),
        }
    }

    /// Apply these overrides on top of `table`, validating each value.
    fn apply(&self, table: &mut IntervalTable) -> Result<(), SettingsError> {
        for endpoint in EndpointKind::ALL {
            let (day, night) = self.pair(endpoint);
            let policy = table.get_mut(endpoint);

            if let Some(day) = day {
                validate_interval(day).map_err(|source| SettingsError::InvalidInterval {
                    key: format!("{}_day_interval", endpoint),
                    source,
                })?;
                policy.day_minutes = day;
            }
            if let Some(night) = night {
                validate_interval(night).map_err(|source| SettingsError::InvalidInterval {
                    key: format!("{}_night_interval", endpoint),
                    source,
                })?;
                policy.night_minutes = night;
            }
        }
        Ok(())
    }
}

/// Setup data captured when an entry is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    pub api_key: String,
    #[serde(default = "default_location")]
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub unit_system: UnitSystem,
    #[serde(flatten)]
    pub intervals: IntervalOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_daily_forecast: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_hourly_forecast: Option<bool>,
}

fn default_location() -> String {
    "home".to_string()
}

/// Options layer; every field overrides the matching data field when set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_system: Option<UnitSystem>,
    #[serde(flatten)]
    pub intervals: IntervalOverrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_daily_forecast: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_hourly_forecast: Option<bool>,
}

/// Effective settings of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSettings {
    pub api_key: String,
    pub location: String,
    pub coordinates: Coordinates,
    pub unit_system: UnitSystem,
    pub intervals: IntervalTable,
    pub night_start: String,
    pub night_end: String,
    pub include_daily_forecast: bool,
    pub include_hourly_forecast: bool,
}

impl WeatherSettings {
    /// Merge the data and options layers. Options win.
    ///
    /// Night window strings are kept verbatim; a malformed window falls back
    /// to the default when the coordinator parses it.
    pub fn merge(data: &EntryData, options: &EntryOptions) -> Result<Self, SettingsError> {
        let latitude = options.latitude.unwrap_or(data.latitude);
        let longitude = options.longitude.unwrap_or(data.longitude);
        validate_coordinates(latitude, longitude)?;

        let mut intervals = IntervalTable::default();
        data.intervals.apply(&mut intervals)?;
        options.intervals.apply(&mut intervals)?;

        let night_start = options
            .night_start
            .clone()
            .or_else(|| data.night_start.clone())
            .unwrap_or_else(|| DEFAULT_NIGHT_START.to_string());
        let night_end = options
            .night_end
            .clone()
            .or_else(|| data.night_end.clone())
            .unwrap_or_else(|| DEFAULT_NIGHT_END.to_string());

        Ok(Self {
            api_key: data.api_key.clone(),
            location: data.location.clone(),
            coordinates: Coordinates::new(latitude, longitude),
            unit_system: options.unit_system.unwrap_or(data.unit_system),
            intervals,
            night_start,
            night_end,
            include_daily_forecast: options
                .include_daily_forecast
                .or(data.include_daily_forecast)
                .unwrap_or(true),
            include_hourly_forecast: options
                .include_hourly_forecast
                .or(data.include_hourly_forecast)
                .unwrap_or(true),
        })
    }

    pub fn night_window(&self) -> NightWindow {
        NightWindow::parse_or_default(&self.night_start, &self.night_end)
    }

    /// Strict validation used when a user submits settings.
    pub fn validate_night_window(&self) -> Result<NightWindow, SettingsError> {
        NightWindow::parse(&self.night_start, &self.night_end)
            .map_err(SettingsError::InvalidNightWindow)
    }
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), SettingsError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(SettingsError::InvalidLatitude(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(SettingsError::InvalidLongitude(longitude));
    }
    Ok(())
}

/// Lowercase, underscore-separated form of a location name.
pub fn location_slug(location: &str) -> String {
    location.trim().to_lowercase().replace(' ', "_")
}

/// Title-cased display form of a location name.
pub fn location_title(location: &str) -> String {
    location
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

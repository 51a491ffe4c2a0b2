//! Database model types.

use chrono::{DateTime, Utc};

use crate::settings::{location_title, EntryData, EntryOptions, SettingsError, WeatherSettings};

/// A configured weather location.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub id: i64,
    pub title: String,
    pub data: EntryData,
    pub options: EntryOptions,
    pub created_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// A new, unsaved entry titled after its location.
    pub fn new(data: EntryData) -> Self {
        Self {
            id: 0,
            title: location_title(&data.location),
            data,
            options: EntryOptions::default(),
            created_at: Utc::now(),
        }
    }

    /// Effective settings with options applied over data.
    pub fn settings(&self) -> Result<WeatherSettings, SettingsError> {
        WeatherSettings::merge(&self.data, &self.options)
    }
}

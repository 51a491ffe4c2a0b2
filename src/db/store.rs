//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use crate::settings::EntryOptions;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database lock poisoned")]
    Poisoned,
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

type EntryRow = (i64, String, String, String, String);

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Config entry CRUD ---

    /// Add a new entry and return its ID.
    pub fn add_entry(&self, entry: &mut ConfigEntry) -> Result<i64, DbError> {
        let data = serde_json::to_string(&entry.data)?;
        let options = serde_json::to_string(&entry.options)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO config_entries (title, data, options, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![entry.title, data, options, entry.created_at.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        entry.id = id;
        Ok(id)
    }

    /// Get all entries.
    pub fn get_entries(&self) -> Result<Vec<ConfigEntry>, DbError> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(
                "SELECT id, title, data, options, created_at FROM config_entries ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], read_row)?
                .collect::<SqlResult<Vec<_>>>()?;
            rows
        };

        rows.into_iter().map(decode_entry).collect()
    }

    /// Get an entry by ID.
    pub fn get_entry(&self, id: i64) -> Result<ConfigEntry, DbError> {
        let row = {
            let conn = self.conn()?;
            let row = conn
                .query_row(
                    "SELECT id, title, data, options, created_at FROM config_entries WHERE id = ?1",
                    params![id],
                    read_row,
                )
                .optional()?;
            row
        };

        row.map(decode_entry).unwrap_or(Err(DbError::NotFound))
    }

    /// Replace the options layer of an entry.
    pub fn update_options(&self, id: i64, options: &EntryOptions) -> Result<(), DbError> {
        let options = serde_json::to_string(options)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE config_entries SET options = ?1 WHERE id = ?2",
            params![options, id],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Delete an entry.
    pub fn delete_entry(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM config_entries WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> SqlResult<EntryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_entry((id, title, data, options, created_at): EntryRow) -> Result<ConfigEntry, DbError> {
    Ok(ConfigEntry {
        id,
        title,
        data: serde_json::from_str(&data)?,
        options: serde_json::from_str(&options)?,
        created_at: parse_db_time(&created_at).unwrap_or_else(Utc::now),
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::UnitSystem;
    use crate::settings::EntryData;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn entry_data() -> EntryData {
        serde_json::from_value(json!({
            "api_key": "secret",
            "location": "lake_cabin",
            "latitude": 45.0,
            "longitude": -93.0,
            "hourly_day_interval": 25
        }))
        .unwrap()
    }

    #[test]
    fn test_entry_crud() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        // Create
        let mut entry = ConfigEntry::new(entry_data());
        let id = store.add_entry(&mut entry).unwrap();
        assert!(id > 0);
        assert_eq!(entry.id, id);

        // Read
        let fetched = store.get_entry(id).unwrap();
        assert_eq!(fetched.title, "Lake Cabin");
        assert_eq!(fetched.data, entry_data());
        assert_eq!(fetched.options, EntryOptions::default());

        // Update options
        let options = EntryOptions {
            unit_system: Some(UnitSystem::Imperial),
            ..Default::default()
        };
        store.update_options(id, &options).unwrap();
        let settings = store.get_entry(id).unwrap().settings().unwrap();
        assert_eq!(settings.unit_system, UnitSystem::Imperial);
        assert_eq!(settings.intervals.hourly.day_minutes, 25);

        assert_eq!(store.get_entries().unwrap().len(), 1);

        // Delete
        store.delete_entry(id).unwrap();
        assert!(matches!(store.get_entry(id), Err(DbError::NotFound)));
        assert!(matches!(store.delete_entry(id), Err(DbError::NotFound)));
    }

    #[test]
    fn test_update_missing_entry() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let result = store.update_options(42, &EntryOptions::default());
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[test]
    fn test_parse_db_time() {
        assert!(parse_db_time("2024-06-15T12:00:00+00:00").is_some());
        assert!(parse_db_time("2024-06-15 12:00:00").is_some());
        assert!(parse_db_time("yesterday").is_none());
    }
}

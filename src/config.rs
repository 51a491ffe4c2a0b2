//! Configuration module for the weather service.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use crate::api::API_BASE_URL;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "google_weather.db")
    pub db_path: String,
    /// How often each coordinator checks its endpoints (default: 60s)
    pub tick_interval: Duration,
    /// Timeout for a single API request (default: 10s)
    pub request_timeout: Duration,
    /// Base URL of the weather API
    pub api_base_url: String,
    /// Entry to create on first start when the database is empty
    pub bootstrap: Option<BootstrapEntry>,
}

/// Location seeded from the environment when no entries exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapEntry {
    pub api_key: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "google_weather.db".to_string(),
            tick_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            api_base_url: API_BASE_URL.to_string(),
            bootstrap: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GOOGLE_WEATHER_HTTP_PORT`: HTTP port (default: 8080)
    /// - `GOOGLE_WEATHER_DB_PATH`: Database file path (default: "google_weather.db")
    /// - `GOOGLE_WEATHER_TICK_SECONDS`: Coordinator tick period (default: 60)
    /// - `GOOGLE_WEATHER_REQUEST_TIMEOUT_SECONDS`: Per-request timeout (default: 10)
    /// - `GOOGLE_WEATHER_API_BASE_URL`: API base URL
    /// - `GOOGLE_WEATHER_API_KEY`, `GOOGLE_WEATHER_LATITUDE`, `GOOGLE_WEATHER_LONGITUDE`,
    ///   `GOOGLE_WEATHER_LOCATION`: bootstrap entry
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("GOOGLE_WEATHER_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("GOOGLE_WEATHER_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(secs) = lookup("GOOGLE_WEATHER_TICK_SECONDS").and_then(|s| s.parse::<u64>().ok()) {
            if secs > 0 {
                cfg.tick_interval = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = lookup("GOOGLE_WEATHER_REQUEST_TIMEOUT_SECONDS")
            .and_then(|s| s.parse::<u64>().ok())
        {
            if secs > 0 {
                cfg.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(url) = lookup("GOOGLE_WEATHER_API_BASE_URL") {
            cfg.api_base_url = url;
        }

        let api_key = lookup("GOOGLE_WEATHER_API_KEY").filter(|k| !k.trim().is_empty());
        let latitude = lookup("GOOGLE_WEATHER_LATITUDE").and_then(|s| s.parse().ok());
        let longitude = lookup("GOOGLE_WEATHER_LONGITUDE").and_then(|s| s.parse().ok());

        if let (Some(api_key), Some(latitude), Some(longitude)) = (api_key, latitude, longitude) {
            cfg.bootstrap = Some(BootstrapEntry {
                api_key,
                location: lookup("GOOGLE_WEATHER_LOCATION").unwrap_or_else(|| "home".to_string()),
                latitude,
                longitude,
            });
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "google_weather.db");
        assert_eq!(cfg.tick_interval, Duration::from_secs(60));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.api_base_url, "https://weather.googleapis.com/v1");
        assert!(cfg.bootstrap.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let cfg = load(&[
            ("GOOGLE_WEATHER_HTTP_PORT", "9000"),
            ("GOOGLE_WEATHER_TICK_SECONDS", "30"),
            ("GOOGLE_WEATHER_REQUEST_TIMEOUT_SECONDS", "0"),
        ]);
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.tick_interval, Duration::from_secs(30));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_bootstrap_requires_key_and_coordinates() {
        let cfg = load(&[("GOOGLE_WEATHER_API_KEY", "k"), ("GOOGLE_WEATHER_LATITUDE", "1.5")]);
        assert!(cfg.bootstrap.is_none());

        let cfg = load(&[
            ("GOOGLE_WEATHER_API_KEY", "k"),
            ("GOOGLE_WEATHER_LATITUDE", "1.5"),
            ("GOOGLE_WEATHER_LONGITUDE", "2.5"),
        ]);
        assert_eq!(
            cfg.bootstrap,
            Some(BootstrapEntry {
                api_key: "k".to_string(),
                location: "home".to_string(),
                latitude: 1.5,
                longitude: 2.5,
            })
        );
    }
}

//! Weather API collaborators.
//!
//! The coordinator reaches the network only through the traits in this module,
//! which keeps the polling logic testable without a live API.

mod credentials;
mod google;

pub use credentials::*;
pub use google::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// API error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("invalid API key or insufficient permissions (HTTP {0})")]
    Unauthorized(u16),
    #[error("not found (HTTP 404)")]
    NotFound,
    #[error("HTTP error: {0}")]
    Status(u16),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("credential refresh failed: {0}")]
    Credential(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ApiError::Unauthorized(status),
            404 => ApiError::NotFound,
            other => ApiError::Status(other),
        }
    }

    /// Whether the error invalidates every other call made with the same credential.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Credential(_))
    }
}

/// A location on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Unit system the API converts values into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "METRIC",
            UnitSystem::Imperial => "IMPERIAL",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential attached to every API request.
#[derive(Clone, PartialEq)]
pub enum Credential {
    ApiKey(String),
    Bearer(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(..)"),
            Credential::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Supplies a valid credential on demand.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a credential that is valid right now, refreshing it if needed.
    async fn ensure_valid(&self) -> Result<Credential, ApiError>;
}

/// The four weather lookups. Implementations return the raw JSON body.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn current(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
        units: UnitSystem,
    ) -> Result<Value, ApiError>;

    async fn daily_forecast(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
        units: UnitSystem,
        days: u32,
    ) -> Result<Value, ApiError>;

    async fn hourly_forecast(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
        units: UnitSystem,
        hours: u32,
    ) -> Result<Value, ApiError>;

    async fn alerts(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
    ) -> Result<Value, ApiError>;
}

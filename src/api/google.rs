//! Google Weather API client.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{ApiError, Coordinates, Credential, UnitSystem, WeatherApi};

/// Default base URL of the Google Weather API.
pub const API_BASE_URL: &str = "https://weather.googleapis.com/v1";

const CURRENT_CONDITIONS_PATH: &str = "currentConditions:lookup";
const DAILY_FORECAST_PATH: &str = "forecast/days:lookup";
const HOURLY_FORECAST_PATH: &str = "forecast/hours:lookup";
const PUBLIC_ALERTS_PATH: &str = "publicAlerts:lookup";

/// Location used to check an API key before any entry exists (Sydney).
const VALIDATION_COORDINATES: Coordinates = Coordinates {
    latitude: -33.8688,
    longitude: 151.2093,
};

/// HTTP client for the four weather lookups.
#[derive(Clone)]
pub struct GoogleWeatherClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl GoogleWeatherClient {
    /// Create a client. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn request(
        &self,
        path: &str,
        credential: &Credential,
        params: &[(&str, String)],
    ) -> reqwest::RequestBuilder {
        let builder = self.client.get(format!("{}/{}", self.base_url, path));

        let builder = match credential {
            Credential::ApiKey(key) => builder.query(&[("key", key.as_str())]),
            Credential::Bearer(token) => builder.bearer_auth(token),
        };

        builder.query(params)
    }

    async fn get_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout)
            } else {
                ApiError::Decode(e.to_string())
            }
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Network(e.to_string())
        }
    }

    /// Check an API key with a current-conditions lookup at a fixed location.
    ///
    /// A 400 still means the key was accepted. Transport failures are returned
    /// as errors so callers can tell "invalid key" from "cannot connect".
    pub async fn validate_api_key(&self, api_key: &str) -> Result<bool, ApiError> {
        let credential = Credential::ApiKey(api_key.trim().to_string());
        let builder = self.request(
            CURRENT_CONDITIONS_PATH,
            &credential,
            &location_params(VALIDATION_COORDINATES),
        );

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        match response.status().as_u16() {
            200 | 400 => Ok(true),
            401 | 403 => Ok(false),
            other => {
                tracing::warn!("Unexpected status {} while validating API key", other);
                Ok(false)
            }
        }
    }
}

fn location_params(coordinates: Coordinates) -> Vec<(&'static str, String)> {
    vec![
        ("location.latitude", coordinates.latitude.to_string()),
        ("location.longitude", coordinates.longitude.to_string()),
    ]
}

fn weather_params(coordinates: Coordinates, units: UnitSystem) -> Vec<(&'static str, String)> {
    let mut params = location_params(coordinates);
    params.push(("units_system", units.as_str().to_string()));
    params
}

#[async_trait]
impl WeatherApi for GoogleWeatherClient {
    async fn current(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
        units: UnitSystem,
    ) -> Result<Value, ApiError> {
        let params = weather_params(coordinates, units);
        self.get_json(self.request(CURRENT_CONDITIONS_PATH, credential, &params))
            .await
    }

    async fn daily_forecast(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
        units: UnitSystem,
        days: u32,
    ) -> Result<Value, ApiError> {
        let mut params = weather_params(coordinates, units);
        params.push(("days", days.to_string()));
        self.get_json(self.request(DAILY_FORECAST_PATH, credential, &params))
            .await
    }

    async fn hourly_forecast(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
        units: UnitSystem,
        hours: u32,
    ) -> Result<Value, ApiError> {
        let mut params = weather_params(coordinates, units);
        params.push(("hours", hours.to_string()));
        self.get_json(self.request(HOURLY_FORECAST_PATH, credential, &params))
            .await
    }

    async fn alerts(
        &self,
        credential: &Credential,
        coordinates: Coordinates,
    ) -> Result<Value, ApiError> {
        // Alerts do not take a unit system.
        let params = location_params(coordinates);
        self.get_json(self.request(PUBLIC_ALERTS_PATH, credential, &params))
            .await
    }
}

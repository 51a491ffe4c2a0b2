//! In-memory API fakes shared by the coordinator and scheduler tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::EndpointKind;
use crate::api::{ApiError, Coordinates, Credential, CredentialProvider, UnitSystem, WeatherApi};

pub struct FakeApi {
    responses: Mutex<HashMap<EndpointKind, Result<Value, ApiError>>>,
    calls: Mutex<HashMap<EndpointKind, usize>>,
    delay: Mutex<Duration>,
}

impl FakeApi {
    /// Every endpoint answers with a small, valid body.
    pub fn healthy() -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            EndpointKind::Current,
            Ok(json!({
                "isDaytime": true,
                "temperature": {"degrees": 21.5, "unit": "CELSIUS"},
                "weatherCondition": {"type": "CLEAR", "description": {"text": "Sunny"}},
                "relativeHumidity": 40
            })),
        );
        responses.insert(
            EndpointKind::Daily,
            Ok(json!({"forecastDays": [{"displayDate": {"year": 2024, "month": 6, "day": 15}}]})),
        );
        responses.insert(
            EndpointKind::Hourly,
            Ok(json!({"forecastHours": [{"interval": {"startTime": "2024-06-15T13:00:00Z"}}]})),
        );
        responses.insert(EndpointKind::Alerts, Ok(json!({"weatherAlerts": []})));

        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn fail(&self, endpoint: EndpointKind, error: ApiError) {
        self.responses.lock().unwrap().insert(endpoint, Err(error));
    }

    pub fn respond(&self, endpoint: EndpointKind, body: Value) {
        self.responses.lock().unwrap().insert(endpoint, Ok(body));
    }

    pub fn fail_all(&self, error: ApiError) {
        for endpoint in EndpointKind::ALL {
            self.fail(endpoint, error.clone());
        }
    }

    /// Every later request sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self, endpoint: EndpointKind) -> usize {
        self.calls.lock().unwrap().get(&endpoint).copied().unwrap_or(0)
    }

    async fn answer(&self, endpoint: EndpointKind) -> Result<Value, ApiError> {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .unwrap_or(Err(ApiError::NotFound))
    }
}

#[async_trait]
impl WeatherApi for FakeApi {
    async fn current(&self, _: &Credential, _: Coordinates, _: UnitSystem) -> Result<Value, ApiError> {
        self.answer(EndpointKind::Current).await
    }

    async fn daily_forecast(
        &self,
        _: &Credential,
        _: Coordinates,
        _: UnitSystem,
        _: u32,
    ) -> Result<Value, ApiError> {
        self.answer(EndpointKind::Daily).await
    }

    async fn hourly_forecast(
        &self,
        _: &Credential,
        _: Coordinates,
        _: UnitSystem,
        _: u32,
    ) -> Result<Value, ApiError> {
        self.answer(EndpointKind::Hourly).await
    }

    async fn alerts(&self, _: &Credential, _: Coordinates) -> Result<Value, ApiError> {
        self.answer(EndpointKind::Alerts).await
    }
}

pub struct FakeCredentials {
    result: Result<Credential, ApiError>,
}

impl FakeCredentials {
    pub fn valid() -> Self {
        Self {
            result: Ok(Credential::ApiKey("test-key".to_string())),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(ApiError::Network("token endpoint unreachable".to_string())),
        }
    }
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn ensure_valid(&self) -> Result<Credential, ApiError> {
        self.result.clone()
    }
}

//! Fetch dispatch for due endpoints.

use serde_json::Value;
use std::collections::BTreeMap;

use super::EndpointKind;
use crate::api::{ApiError, Coordinates, Credential, CredentialProvider, UnitSystem, WeatherApi};

/// Days requested from the daily forecast lookup.
pub const DAILY_FORECAST_DAYS: u32 = 10;
/// Hours requested from the hourly forecast lookup.
pub const HOURLY_FORECAST_HOURS: u32 = 240;

/// Freshly parsed payloads, keyed by the endpoints that succeeded.
pub type PartialPayloads = BTreeMap<EndpointKind, Value>;

/// Result of dispatching one set of due endpoints.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub payloads: PartialPayloads,
    /// `Some(false)` when the alerts lookup reported no coverage for the location.
    pub alerts_supported: Option<bool>,
}

/// Fetch every due endpoint, in order.
///
/// A failing endpoint is skipped without affecting the others, except for
/// credential failures, which abort the remaining lookups. The dispatch fails
/// as a whole only when the credential is rejected or nothing succeeded.
pub async fn fetch_due(
    api: &dyn WeatherApi,
    credentials: &dyn CredentialProvider,
    due: &[EndpointKind],
    coordinates: Coordinates,
    units: UnitSystem,
) -> Result<FetchOutcome, ApiError> {
    let credential = credentials.ensure_valid().await.map_err(|e| {
        if e.is_fatal() {
            e
        } else {
            ApiError::Credential(e.to_string())
        }
    })?;

    let mut outcome = FetchOutcome::default();
    let mut last_error = None;

    for &endpoint in due {
        tracing::debug!("Fetching {} endpoint", endpoint);

        match fetch_endpoint(api, &credential, endpoint, coordinates, units).await {
            Ok(payload) => {
                if endpoint == EndpointKind::Alerts {
                    outcome.alerts_supported = Some(true);
                }
                outcome.payloads.insert(endpoint, payload);
            }
            Err(ApiError::NotFound) if endpoint == EndpointKind::Alerts => {
                tracing::info!(
                    "Weather alerts not available for this location (HTTP 404), \
                     normal for regions without alert coverage"
                );
                outcome.alerts_supported = Some(false);
                outcome.payloads.insert(endpoint, Value::Array(Vec::new()));
            }
            Err(e) if e.is_fatal() => {
                tracing::error!("Aborting fetch after {} endpoint failed: {}", endpoint, e);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {} endpoint: {}", endpoint, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if outcome.payloads.is_empty() => Err(e),
        _ => Ok(outcome),
    }
}

/// Fetch and normalize a single endpoint.
pub async fn fetch_endpoint(
    api: &dyn WeatherApi,
    credential: &Credential,
    endpoint: EndpointKind,
    coordinates: Coordinates,
    units: UnitSystem,
) -> Result<Value, ApiError> {
    match endpoint {
        EndpointKind::Current => api.current(credential, coordinates, units).await,
        EndpointKind::Daily => api
            .daily_forecast(credential, coordinates, units, DAILY_FORECAST_DAYS)
            .await
            .map(|body| take_list(body, "forecastDays")),
        EndpointKind::Hourly => api
            .hourly_forecast(credential, coordinates, units, HOURLY_FORECAST_HOURS)
            .await
            .map(|body| take_list(body, "forecastHours")),
        EndpointKind::Alerts => api
            .alerts(credential, coordinates)
            .await
            .map(|body| take_list(body, "weatherAlerts")),
    }
}

/// Pull a list field out of a response body; a missing field is an empty list.
fn take_list(mut body: Value, field: &str) -> Value {
    match body.get_mut(field).map(Value::take) {
        Some(list @ Value::Array(_)) => list,
        _ => Value::Array(Vec::new()),
    }
}

//! HTTP request handlers.

use super::AppState;
use crate::api::UnitSystem;
use crate::coordinator::{EndpointKind, UpdateError};
use crate::db::{ConfigEntry, DbError};
use crate::entities::{render_binary_sensors, render_sensors, render_weather};
use crate::scheduler::EntryHandle;
use crate::settings::{validate_coordinates, EntryData, EntryOptions, WeatherSettings};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

/// Entry as returned by the API. The API key is never echoed back.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: i64,
    pub title: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub unit_system: UnitSystem,
    pub options: EntryOptions,
    pub created_at: DateTime<Utc>,
}

impl From<&ConfigEntry> for EntryResponse {
    fn from(entry: &ConfigEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            location: entry.data.location.clone(),
            latitude: entry.options.latitude.unwrap_or(entry.data.latitude),
            longitude: entry.options.longitude.unwrap_or(entry.data.longitude),
            unit_system: entry.options.unit_system.unwrap_or(entry.data.unit_system),
            options: entry.options.clone(),
            created_at: entry.created_at,
        }
    }
}

fn db_error_response(e: DbError) -> Response {
    match e {
        DbError::NotFound => (StatusCode::NOT_FOUND, "Entry not found").into_response(),
        e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Validate settings the way a user-facing form would: strictly.
fn validate_settings(data: &EntryData, options: &EntryOptions) -> Result<WeatherSettings, String> {
    let settings = WeatherSettings::merge(data, options).map_err(|e| e.to_string())?;
    settings.validate_night_window().map_err(|e| e.to_string())?;
    Ok(settings)
}

async fn running_entry(state: &AppState, id: i64) -> Result<EntryHandle, Response> {
    state
        .scheduler
        .get(id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Entry not found").into_response())
}

// ============================================================================
// API: Entries
// ============================================================================

pub async fn handle_get_entries(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_entries() {
        Ok(entries) => {
            let entries: Vec<EntryResponse> = entries.iter().map(EntryResponse::from).collect();
            Json(entries).into_response()
        }
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_create_entry(
    State(state): State<AppState>,
    Json(mut data): Json<EntryData>,
) -> impl IntoResponse {
    data.api_key = data.api_key.trim().to_string();
    if data.api_key.is_empty() {
        return (StatusCode::BAD_REQUEST, "API key is required").into_response();
    }

    if let Err(e) = validate_coordinates(data.latitude, data.longitude) {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }

    if let Err(e) = validate_settings(&data, &EntryOptions::default()) {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    match state.client.validate_api_key(&data.api_key).await {
        Ok(true) => {}
        Ok(false) => return (StatusCode::BAD_REQUEST, "Invalid API key").into_response(),
        Err(e) => {
            tracing::error!("Error validating API key: {}", e);
            return (StatusCode::BAD_GATEWAY, format!("Cannot connect: {}", e)).into_response();
        }
    }

    let mut entry = ConfigEntry::new(data);
    if let Err(e) = state.store.add_entry(&mut entry) {
        return db_error_response(e);
    }

    // The entry stays registered even if its first refresh fails
    if let Err(e) = state.scheduler.setup_entry(&entry).await {
        tracing::warn!("First refresh for {} failed: {}", entry.title, e);
    }

    (StatusCode::CREATED, Json(EntryResponse::from(&entry))).into_response()
}

pub async fn handle_update_options(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(options): Json<EntryOptions>,
) -> impl IntoResponse {
    let mut entry = match state.store.get_entry(id) {
        Ok(entry) => entry,
        Err(e) => return db_error_response(e),
    };

    if let Err(e) = validate_settings(&entry.data, &options) {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    if let Err(e) = state.store.update_options(id, &options) {
        return db_error_response(e);
    }
    entry.options = options;

    if let Err(e) = state.scheduler.reload_entry(&entry).await {
        tracing::warn!("Refresh after updating {} failed: {}", entry.title, e);
    }

    Json(EntryResponse::from(&entry)).into_response()
}

pub async fn handle_delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state.scheduler.unload_entry(id).await;

    match state.store.delete_entry(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Views
// ============================================================================

pub async fn handle_get_snapshot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let handle = match running_entry(&state, id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let view = handle.state.borrow().clone();
    let endpoints: serde_json::Map<String, Value> = EndpointKind::ALL
        .iter()
        .map(|endpoint| {
            let last_fetch = view.last_fetch(*endpoint);
            (endpoint.to_string(), json!({ "last_fetch": last_fetch }))
        })
        .collect();

    Json(json!({
        "name": view.name,
        "night_mode": view.is_night_now(),
        "alerts_supported": view.alerts_supported,
        "endpoints": endpoints,
        "data": view.snapshot,
    }))
    .into_response()
}

pub async fn handle_get_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let handle = match running_entry(&state, id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let view = handle.state.borrow().clone();
    let settings = &view.settings;

    Json(render_sensors(&settings.location, view.snapshot.as_ref(), settings.unit_system)).into_response()
}

pub async fn handle_get_binary_sensors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let handle = match running_entry(&state, id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let view = handle.state.borrow().clone();

    Json(render_binary_sensors(
        &view.settings.location,
        view.snapshot.as_ref(),
        view.alerts_supported,
    ))
    .into_response()
}

pub async fn handle_get_weather(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let handle = match running_entry(&state, id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let view = handle.state.borrow().clone();

    Json(render_weather(&view.settings, view.snapshot.as_ref())).into_response()
}

// ============================================================================
// API: On-demand forecast
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastType {
    Daily,
    Hourly,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub forecast_type: ForecastType,
}

pub async fn handle_get_forecast(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ForecastRequest>,
) -> impl IntoResponse {
    let handle = match running_entry(&state, id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let endpoint = match req.forecast_type {
        ForecastType::Daily => EndpointKind::Daily,
        ForecastType::Hourly => EndpointKind::Hourly,
    };

    let mut coordinator = handle.coordinator.lock().await;
    let forecast = match coordinator.fetch_now(endpoint).await {
        Ok(forecast) => {
            tracing::info!(
                "On-demand {} forecast fetched for {}: {} items",
                endpoint,
                coordinator.name(),
                forecast.as_array().map_or(0, Vec::len)
            );
            forecast
        }
        Err(e @ UpdateError::Auth(_)) => {
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
        Err(e) => {
            tracing::warn!(
                "On-demand {} forecast for {} failed, using cached data: {}",
                endpoint,
                coordinator.name(),
                e
            );
            coordinator
                .snapshot()
                .and_then(|s| s.get(endpoint).cloned())
                .unwrap_or_else(|| Value::Array(Vec::new()))
        }
    };

    Json(json!({ "forecast": forecast })).into_response()
}

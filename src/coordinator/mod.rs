//! Adaptive polling coordinator.
//!
//! Each tick the coordinator checks which of the four endpoints are stale
//! under the current day/night interval, fetches only those, and merges the
//! results into its cache. Failures never discard cached data: once a
//! snapshot exists it stays available through outages.

mod cache;
mod dispatch;
mod night;
mod staleness;
#[cfg(test)]
pub(crate) mod testing;

pub use cache::*;
pub use dispatch::*;
pub use night::*;
pub use staleness::*;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, CredentialProvider, WeatherApi};
use crate::settings::WeatherSettings;

/// The four independently scheduled weather lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Current,
    Daily,
    Hourly,
    Alerts,
}

impl EndpointKind {
    /// All endpoints, in fetch order.
    pub const ALL: [EndpointKind; 4] = [
        EndpointKind::Current,
        EndpointKind::Daily,
        EndpointKind::Hourly,
        EndpointKind::Alerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Current => "current",
            EndpointKind::Daily => "daily",
            EndpointKind::Hourly => "hourly",
            EndpointKind::Alerts => "alerts",
        }
    }

    /// Key of the endpoint's payload in a serialized snapshot.
    pub fn cache_key(&self) -> &'static str {
        match self {
            EndpointKind::Current => "current",
            EndpointKind::Daily => "daily_forecast",
            EndpointKind::Hourly => "hourly_forecast",
            EndpointKind::Alerts => "alerts",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Update failure surfaced to the scheduler.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("invalid API key or insufficient permissions: {0}")]
    Auth(ApiError),
    #[error("error communicating with API: {0}")]
    Api(ApiError),
    #[error("fetch worker failed: {0}")]
    Worker(String),
}

impl From<ApiError> for UpdateError {
    fn from(e: ApiError) -> Self {
        if e.is_fatal() {
            UpdateError::Auth(e)
        } else {
            UpdateError::Api(e)
        }
    }
}

/// Malformed interval or night window.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("interval {0} is outside 1..=1440 minutes")]
    IntervalOutOfRange(u32),
    #[error("invalid time of day: {0:?}")]
    InvalidTimeOfDay(String),
}

/// Read-only state of a coordinator, republished after every change.
///
/// Readers hold a `watch` receiver of this and never lock the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorView {
    pub name: String,
    pub settings: WeatherSettings,
    pub night_window: NightWindow,
    pub alerts_supported: Option<bool>,
    pub last_fetch: BTreeMap<EndpointKind, DateTime<Local>>,
    /// `None` until the first successful refresh.
    pub snapshot: Option<Snapshot>,
}

impl CoordinatorView {
    pub fn last_fetch(&self, endpoint: EndpointKind) -> Option<DateTime<Local>> {
        self.last_fetch.get(&endpoint).copied()
    }

    pub fn is_night_now(&self) -> bool {
        is_night(Local::now().time(), &self.night_window)
    }
}

/// Polls one location's four endpoints and owns their cache.
pub struct Coordinator {
    name: String,
    settings: WeatherSettings,
    night_window: NightWindow,
    api: Arc<dyn WeatherApi>,
    credentials: Arc<dyn CredentialProvider>,
    cache: EndpointCache,
    alerts_supported: Option<bool>,
    view_tx: watch::Sender<CoordinatorView>,
}

impl Coordinator {
    pub fn new(
        name: &str,
        settings: WeatherSettings,
        api: Arc<dyn WeatherApi>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let night_window = settings.night_window();
        let (view_tx, _) = watch::channel(CoordinatorView {
            name: name.to_string(),
            settings: settings.clone(),
            night_window,
            alerts_supported: None,
            last_fetch: BTreeMap::new(),
            snapshot: None,
        });

        Self {
            name: name.to_string(),
            settings,
            night_window,
            api,
            credentials,
            cache: EndpointCache::new(),
            alerts_supported: None,
            view_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn settings(&self) -> &WeatherSettings {
        &self.settings
    }

    /// `Some(false)` once the alerts lookup reported no coverage for this location.
    #[cfg(test)]
    pub fn alerts_supported(&self) -> Option<bool> {
        self.alerts_supported
    }

    #[cfg(test)]
    pub fn last_fetch(&self, endpoint: EndpointKind) -> Option<DateTime<Local>> {
        self.cache.last_fetch(endpoint)
    }

    /// Receiver that sees every published view.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorView> {
        self.view_tx.subscribe()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.view_tx.borrow().snapshot.clone()
    }

    /// Run one update cycle at the current wall-clock time.
    pub async fn tick(&mut self) -> Result<Snapshot, UpdateError> {
        self.tick_at(Local::now()).await
    }

    /// Run one update cycle as if the time were `now`.
    pub async fn tick_at(&mut self, now: DateTime<Local>) -> Result<Snapshot, UpdateError> {
        let due = due_endpoints(&self.cache, now, &self.night_window, &self.settings.intervals);

        if due.is_empty() {
            tracing::debug!("{}: no endpoints need updating, using cached data", self.name);
            return Ok(self.publish(self.cache.snapshot()));
        }

        tracing::debug!(
            "{}: updating endpoints {} (night mode: {})",
            self.name,
            due.iter().map(EndpointKind::as_str).collect::<Vec<_>>().join(", "),
            is_night(now.time(), &self.night_window)
        );

        match self.dispatch(due).await {
            Ok(outcome) => {
                self.record_alerts_support(outcome.alerts_supported);
                let snapshot = self.cache.reconcile(outcome.payloads, now);
                Ok(self.publish(snapshot))
            }
            Err(e) => {
                tracing::error!("{}: error fetching weather data: {}", self.name, e);
                if self.cache.is_empty() {
                    return Err(e);
                }
                tracing::warn!("{}: using cached data due to API error", self.name);
                Ok(self.publish(self.cache.snapshot()))
            }
        }
    }

    /// Fetch one endpoint immediately, ignoring its interval.
    ///
    /// The result is merged into the cache like a regular refresh.
    pub async fn fetch_now(&mut self, endpoint: EndpointKind) -> Result<Value, UpdateError> {
        self.fetch_now_at(endpoint, Local::now()).await
    }

    pub async fn fetch_now_at(
        &mut self,
        endpoint: EndpointKind,
        now: DateTime<Local>,
    ) -> Result<Value, UpdateError> {
        let outcome = self.dispatch(vec![endpoint]).await?;
        self.record_alerts_support(outcome.alerts_supported);

        let payload = outcome
            .payloads
            .get(&endpoint)
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));

        let snapshot = self.cache.reconcile(outcome.payloads, now);
        self.publish(snapshot);

        Ok(payload)
    }

    /// Swap in new settings. Cached payloads are kept.
    ///
    /// New intervals apply from the next tick. A new location or unit system
    /// makes every endpoint due, so cached values are not shown against the
    /// wrong place or units for longer than one tick.
    pub fn reconfigure(&mut self, settings: WeatherSettings) {
        if settings.coordinates != self.settings.coordinates
            || settings.unit_system != self.settings.unit_system
        {
            self.cache.expire_all();
            tracing::info!("{}: location or units changed, refreshing all endpoints", self.name);
        }

        self.night_window = settings.night_window();
        self.settings = settings;
        self.view_tx.send_replace(self.view(self.snapshot()));
        tracing::info!("{}: settings updated", self.name);
    }

    /// Run the fetch for `due` on a separate task.
    async fn dispatch(&self, due: Vec<EndpointKind>) -> Result<FetchOutcome, UpdateError> {
        let api = self.api.clone();
        let credentials = self.credentials.clone();
        let coordinates = self.settings.coordinates;
        let units = self.settings.unit_system;

        let handle = tokio::spawn(async move {
            fetch_due(api.as_ref(), credentials.as_ref(), &due, coordinates, units).await
        });

        match handle.await {
            Ok(result) => result.map_err(UpdateError::from),
            Err(e) => Err(UpdateError::Worker(e.to_string())),
        }
    }

    fn record_alerts_support(&mut self, supported: Option<bool>) {
        if supported.is_some() {
            self.alerts_supported = supported;
        }
    }

    fn view(&self, snapshot: Option<Snapshot>) -> CoordinatorView {
        CoordinatorView {
            name: self.name.clone(),
            settings: self.settings.clone(),
            night_window: self.night_window,
            alerts_supported: self.alerts_supported,
            last_fetch: self.cache.fetch_times(),
            snapshot,
        }
    }

    fn publish(&self, snapshot: Snapshot) -> Snapshot {
        self.view_tx.send_replace(self.view(Some(snapshot.clone())));
        snapshot
    }
}

//! Per-endpoint cache and snapshot reconciliation.

use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{EndpointKind, PartialPayloads};

/// Freshness and cached payload of one endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointState {
    /// When the endpoint last refreshed successfully. `None` until the first success.
    pub last_fetch: Option<DateTime<Local>>,
    /// Last successfully fetched payload, kept across failed refreshes.
    pub payload: Option<Value>,
}

/// Cache of all endpoint states, owned by a single coordinator.
#[derive(Debug, Clone, Default)]
pub struct EndpointCache {
    states: BTreeMap<EndpointKind, EndpointState>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, endpoint: EndpointKind) -> EndpointState {
        self.states.get(&endpoint).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn last_fetch(&self, endpoint: EndpointKind) -> Option<DateTime<Local>> {
        self.states.get(&endpoint).and_then(|s| s.last_fetch)
    }

    /// Timestamps of every endpoint that has refreshed at least once.
    pub fn fetch_times(&self) -> BTreeMap<EndpointKind, DateTime<Local>> {
        self.states
            .iter()
            .filter_map(|(endpoint, state)| state.last_fetch.map(|t| (*endpoint, t)))
            .collect()
    }

    /// Mark every endpoint as never fetched. Payloads stay for stale fallback.
    pub fn expire_all(&mut self) {
        for state in self.states.values_mut() {
            state.last_fetch = None;
        }
    }

    /// True when no endpoint has ever produced a payload.
    pub fn is_empty(&self) -> bool {
        self.states.values().all(|s| s.payload.is_none())
    }

    /// The merged view of every cached payload.
    pub fn snapshot(&self) -> Snapshot {
        let payloads = self
            .states
            .iter()
            .filter_map(|(endpoint, state)| state.payload.clone().map(|p| (*endpoint, p)))
            .collect();
        Snapshot { payloads }
    }

    /// Merge freshly fetched payloads and stamp them with `now`.
    ///
    /// Endpoints missing from `fresh` keep their previous payload and
    /// timestamp. Always returns the full merged snapshot.
    pub fn reconcile(&mut self, fresh: PartialPayloads, now: DateTime<Local>) -> Snapshot {
        for (endpoint, payload) in fresh {
            let state = self.states.entry(endpoint).or_default();
            state.payload = Some(payload);
            state.last_fetch = Some(now);
        }
        self.snapshot()
    }
}

/// Merged, read-only view of all cached endpoint payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    payloads: BTreeMap<EndpointKind, Value>,
}

impl Snapshot {
    pub fn get(&self, endpoint: EndpointKind) -> Option<&Value> {
        self.payloads.get(&endpoint)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Current conditions object, if fetched.
    pub fn current(&self) -> Option<&Value> {
        self.get(EndpointKind::Current)
    }

    pub fn daily_forecast(&self) -> &[Value] {
        self.list(EndpointKind::Daily)
    }

    pub fn hourly_forecast(&self) -> &[Value] {
        self.list(EndpointKind::Hourly)
    }

    pub fn alerts(&self) -> &[Value] {
        self.list(EndpointKind::Alerts)
    }

    fn list(&self, endpoint: EndpointKind) -> &[Value] {
        self.get(endpoint)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.payloads.len()))?;
        for (endpoint, payload) in &self.payloads {
            map.serialize_entry(endpoint.cache_key(), payload)?;
        }
        map.end()
    }
}

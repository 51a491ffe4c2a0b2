//! Scheduler module: the registry of running coordinators and their tick loops.

use crate::api::{ApiKeyProvider, WeatherApi};
use crate::coordinator::{Coordinator, CoordinatorView, UpdateError};
use crate::db::{ConfigEntry, DbError, Store};
use crate::settings::SettingsError;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, RwLock};

/// Scheduler error types.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("first refresh failed: {0}")]
    Update(#[from] UpdateError),
    #[error("database error: {0}")]
    Db(#[from] DbError),
}

/// A running entry: its coordinator plus the channel that stops its loop.
///
/// Readers use `state`. Only writers lock `coordinator`.
#[derive(Clone)]
pub struct EntryHandle {
    pub coordinator: Arc<Mutex<Coordinator>>,
    pub state: watch::Receiver<CoordinatorView>,
    stop_tx: broadcast::Sender<()>,
}

/// Runs one tick loop per configured entry.
pub struct Scheduler {
    store: Arc<Store>,
    api: Arc<dyn WeatherApi>,
    tick_interval: Duration,
    entries: Arc<RwLock<HashMap<i64, EntryHandle>>>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, api: Arc<dyn WeatherApi>, tick_interval: Duration) -> Self {
        Self {
            store,
            api,
            tick_interval,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Set up every stored entry.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let entries = self.store.get_entries()?;

        tracing::info!("Starting scheduler with {} entries", entries.len());

        for entry in entries {
            if let Err(e) = self.setup_entry(&entry).await {
                tracing::error!("Scheduler: Failed to set up {}: {}", entry.title, e);
            }
        }

        Ok(())
    }

    /// Build a coordinator for `entry`, run its first refresh and start its loop.
    ///
    /// A failed first refresh is returned to the caller, but the entry stays
    /// registered and keeps retrying on every tick.
    pub async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), SchedulerError> {
        let settings = entry.settings()?;

        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.id) {
            return Ok(()); // Already running
        }

        let credentials = Arc::new(ApiKeyProvider::new(&settings.api_key));
        let coordinator = Coordinator::new(&entry.title, settings, self.api.clone(), credentials);
        let state = coordinator.subscribe();
        let coordinator = Arc::new(Mutex::new(coordinator));
        let (stop_tx, stop_rx) = broadcast::channel(1);

        entries.insert(
            entry.id,
            EntryHandle {
                coordinator: coordinator.clone(),
                state,
                stop_tx,
            },
        );
        drop(entries);

        tracing::info!("Scheduler: Added entry {} ({})", entry.id, entry.title);

        // Registry lock is already released; the first fetch holds only this coordinator
        let first_refresh = coordinator.lock().await.tick().await;

        tokio::spawn(run_tick_loop(
            entry.title.clone(),
            coordinator,
            self.tick_interval,
            stop_rx,
        ));

        first_refresh.map(|_| ()).map_err(SchedulerError::from)
    }

    /// Stop an entry's loop and drop it from the registry.
    pub async fn unload_entry(&self, id: i64) -> bool {
        let mut entries = self.entries.write().await;

        match entries.remove(&id) {
            Some(handle) => {
                let _ = handle.stop_tx.send(());
                tracing::info!("Scheduler: Removed entry {}", id);
                true
            }
            None => false,
        }
    }

    /// Apply changed settings to a running entry and refresh it right away.
    ///
    /// Cached data survives; entries that are not running are set up instead.
    pub async fn reload_entry(&self, entry: &ConfigEntry) -> Result<(), SchedulerError> {
        let settings = entry.settings()?;

        let Some(handle) = self.get(entry.id).await else {
            return self.setup_entry(entry).await;
        };

        let mut coordinator = handle.coordinator.lock().await;
        coordinator.reconfigure(settings);
        coordinator.tick().await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Option<EntryHandle> {
        self.entries.read().await.get(&id).cloned()
    }

    #[cfg(test)]
    pub async fn entry_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.entries.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Tick one coordinator until stopped.
async fn run_tick_loop(
    name: String,
    coordinator: Arc<Mutex<Coordinator>>,
    tick_interval: Duration,
    mut stop_rx: broadcast::Receiver<()>,
) {
    // Spread entries out so they do not all hit the API in the same instant
    let jitter = rand::random::<u64>() % 1000;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately and setup already refreshed.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                let mut coordinator = coordinator.lock().await;
                if let Err(e) = coordinator.tick().await {
                    tracing::error!("Update failed for {}: {}", name, e);
                }
            }
        }
    }

    tracing::debug!("Tick loop for {} stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::coordinator::testing::FakeApi;
    use crate::coordinator::EndpointKind;
    use crate::settings::EntryData;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn entry(store: &Store) -> ConfigEntry {
        let data: EntryData = serde_json::from_value(json!({
            "api_key": "key",
            "location": "home",
            "latitude": 52.37,
            "longitude": 4.89
        }))
        .unwrap();
        let mut entry = ConfigEntry::new(data);
        store.add_entry(&mut entry).unwrap();
        entry
    }

    fn scheduler(api: &Arc<FakeApi>) -> (Scheduler, Arc<Store>, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let scheduler = Scheduler::new(store.clone(), api.clone(), Duration::from_secs(3600));
        (scheduler, store, tmp)
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let api = Arc::new(FakeApi::healthy());
        let (scheduler, store, _tmp) = scheduler(&api);
        let entry = entry(&store);

        scheduler.setup_entry(&entry).await.unwrap();
        assert_eq!(scheduler.entry_ids().await, vec![entry.id]);

        let handle = scheduler.get(entry.id).await.unwrap();
        assert!(handle.state.borrow().snapshot.is_some());

        // Setting up twice is a no-op
        scheduler.setup_entry(&entry).await.unwrap();
        assert_eq!(api.calls(EndpointKind::Current), 1);

        assert!(scheduler.unload_entry(entry.id).await);
        assert!(scheduler.get(entry.id).await.is_none());
        assert!(!scheduler.unload_entry(entry.id).await);
    }

    #[tokio::test]
    async fn test_failed_first_refresh_stays_registered() {
        let api = Arc::new(FakeApi::healthy());
        api.fail_all(ApiError::Status(503));
        let (scheduler, store, _tmp) = scheduler(&api);
        let entry = entry(&store);

        let result = scheduler.setup_entry(&entry).await;
        assert!(matches!(result, Err(SchedulerError::Update(_))));

        let handle = scheduler.get(entry.id).await.unwrap();
        assert!(handle.state.borrow().snapshot.is_none());
    }

    #[tokio::test]
    async fn test_reload_applies_options() {
        let api = Arc::new(FakeApi::healthy());
        let (scheduler, store, _tmp) = scheduler(&api);
        let mut entry = entry(&store);
        scheduler.start().await.unwrap();

        entry.options.night_start = Some("21:00".to_string());
        scheduler.reload_entry(&entry).await.unwrap();

        let handle = scheduler.get(entry.id).await.unwrap();
        let coordinator = handle.coordinator.lock().await;
        assert_eq!(coordinator.settings().night_start, "21:00");
        assert!(coordinator.snapshot().is_some());
        assert_eq!(handle.state.borrow().settings.night_start, "21:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_loop_retries_until_unloaded() {
        let api = Arc::new(FakeApi::healthy());
        api.fail_all(ApiError::Status(503));
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let scheduler = Scheduler::new(store.clone(), api.clone(), Duration::from_secs(60));
        let entry = entry(&store);

        assert!(scheduler.setup_entry(&entry).await.is_err());
        assert_eq!(api.calls(EndpointKind::Current), 1);

        // Jitter is under a second, so one loop tick lands inside this window.
        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(api.calls(EndpointKind::Current), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(api.calls(EndpointKind::Current), 3);

        assert!(scheduler.unload_entry(entry.id).await);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.calls(EndpointKind::Current), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_readable_during_first_refresh() {
        let api = Arc::new(FakeApi::healthy());
        let (scheduler, store, _tmp) = scheduler(&api);
        let first = entry(&store);
        let second = entry(&store);
        scheduler.setup_entry(&first).await.unwrap();

        api.set_delay(Duration::from_secs(30));
        let scheduler = Arc::new(scheduler);
        let setup = tokio::spawn({
            let scheduler = scheduler.clone();
            let second = second.clone();
            async move { scheduler.setup_entry(&second).await }
        });

        // Wait until the second entry's fetch is in flight.
        while api.calls(EndpointKind::Current) < 2 {
            tokio::task::yield_now().await;
        }

        let handle = tokio::time::timeout(Duration::from_millis(500), scheduler.get(first.id))
            .await
            .expect("registry locked during refresh");
        assert!(handle.unwrap().state.borrow().snapshot.is_some());

        let pending = scheduler.get(second.id).await.unwrap();
        assert!(pending.state.borrow().snapshot.is_none());

        setup.await.unwrap().unwrap();
        assert!(pending.state.borrow().snapshot.is_some());
    }
}

//! Google Weather - adaptive polling service
//!
//! Polls the Google Weather API for each configured location, refreshing
//! current conditions, forecasts and alerts on independent day/night
//! schedules, and serves the merged data over HTTP.

mod api;
mod config;
mod coordinator;
mod db;
mod entities;
mod scheduler;
mod settings;
mod web;

use api::GoogleWeatherClient;
use config::ServerConfig;
use db::{ConfigEntry, Store};
use scheduler::Scheduler;
use settings::{EntryData, IntervalOverrides};
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("google_weather=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Google Weather on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // API client shared by every coordinator
    let client = Arc::new(GoogleWeatherClient::new(&cfg.api_base_url, cfg.request_timeout)?);

    // Create scheduler
    let scheduler = Arc::new(Scheduler::new(store.clone(), client.clone(), cfg.tick_interval));

    // Seed an entry from the environment if none exist
    if let Some(bootstrap) = &cfg.bootstrap {
        if store.get_entries()?.is_empty() {
            tracing::info!("Adding entry for {} from environment", bootstrap.location);
            let mut entry = ConfigEntry::new(EntryData {
                api_key: bootstrap.api_key.clone(),
                location: bootstrap.location.clone(),
                latitude: bootstrap.latitude,
                longitude: bootstrap.longitude,
                unit_system: Default::default(),
                intervals: IntervalOverrides::default(),
                night_start: None,
                night_end: None,
                include_daily_forecast: None,
                include_hourly_forecast: None,
            });
            if let Err(e) = entry.settings() {
                return Err(format!("invalid bootstrap entry: {}", e).into());
            }
            store.add_entry(&mut entry)?;
        }
    }

    // Start scheduler
    scheduler.start().await?;

    // Start web server
    let server = Server::new(cfg, store, scheduler, client);
    server.start().await?;

    Ok(())
}

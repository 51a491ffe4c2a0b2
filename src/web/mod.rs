//! Web server module.

mod handlers;

use crate::api::GoogleWeatherClient;
use crate::config::ServerConfig;
use crate::db::Store;
use crate::scheduler::Scheduler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
    pub client: Arc<GoogleWeatherClient>,
}

/// HTTP front end for configured weather entries.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        store: Arc<Store>,
        scheduler: Arc<Scheduler>,
        client: Arc<GoogleWeatherClient>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                store,
                scheduler,
                client,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        // Entries
        .route("/api/entries", get(handlers::handle_get_entries))
        .route("/api/entries", post(handlers::handle_create_entry))
        .route("/api/entries/{id}", delete(handlers::handle_delete_entry))
        .route("/api/entries/{id}/options", put(handlers::handle_update_options))
        // Views
        .route("/api/entries/{id}/snapshot", get(handlers::handle_get_snapshot))
        .route("/api/entries/{id}/sensors", get(handlers::handle_get_sensors))
        .route("/api/entries/{id}/binary_sensors", get(handlers::handle_get_binary_sensors))
        .route("/api/entries/{id}/weather", get(handlers::handle_get_weather))
        // On-demand forecast
        .route("/api/entries/{id}/forecast", post(handlers::handle_get_forecast))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

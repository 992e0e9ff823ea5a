//! Fleetwatch server library logic.

pub mod api;
pub mod config;
pub mod middleware;
pub mod retention;
pub mod service;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use fleetwatch_store::EventStore;
use fleetwatch_types::StoreProvider;
use service::{IngestionService, QueryService};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Validating write path.
    pub ingestion: IngestionService,
    /// Read path.
    pub query: QueryService,
    /// Backend reported by the health checks.
    pub provider: StoreProvider,
    /// Expected `X-Api-Key` value. Empty disables the check.
    pub api_key: String,
}

impl AppState {
    /// Builds the state around one shared store.
    pub fn new(store: Arc<dyn EventStore>, api_key: impl Into<String>) -> Self {
        Self {
            provider: store.provider(),
            ingestion: IngestionService::new(Arc::clone(&store)),
            query: QueryService::new(store),
            api_key: api_key.into(),
        }
    }
}

/// Maximum request body size (64 KiB). A status event is a few hundred bytes.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/status/events", post(api::ingest_event_handler))
        .route("/api/status/summary", get(api::summary_handler))
        .route("/api/status/nodes", get(api::nodes_handler))
        .route(
            "/api/status/nodes/{nodeName}/events",
            get(api::node_events_handler),
        )
        .route("/api/query/summary", get(api::summary_handler))
        .route("/api/query/nodes", get(api::nodes_handler))
        .route(
            "/api/query/nodes/{nodeName}/events",
            get(api::node_events_handler),
        )
        .layer(axum::middleware::from_fn(middleware::api_key_middleware));

    Router::new()
        .route("/api/status/health", get(api::status_health_handler))
        .route("/api/query/health", get(api::query_health_handler))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

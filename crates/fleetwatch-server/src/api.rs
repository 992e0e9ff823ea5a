//! API handlers for the Fleetwatch server.
//!
//! Store calls are synchronous and may touch disk, so every handler runs
//! them through [`run_blocking`].

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use fleetwatch_store::StoreError;
use fleetwatch_types::{
    IngestionResult, NodeStatus, StatusEvent, StoreProvider, Summary, DEFAULT_TAKE,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Service name reported by the ingestion surface health check.
pub const STATUS_SERVICE_NAME: &str = "Fleetwatch Monitoring API";

/// Service name reported by the read-only surface health check.
pub const QUERY_SERVICE_NAME: &str = "Fleetwatch Monitoring Query API";

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "event store operation failed");
        ApiError::InternalServerError(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Runs a store operation on the blocking pool and flattens both failure
/// layers into `ApiError`.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
        .map_err(ApiError::from)
}

/// Response body for the health checks.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Which surface answered.
    pub service: String,
    /// Always `ok` when the process is serving.
    pub status: String,
    /// The configured event store backend.
    pub provider: StoreProvider,
    /// Server time.
    pub utc: DateTime<Utc>,
    /// Server version.
    pub version: String,
}

fn health_response(service: &str, provider: StoreProvider) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: service.to_string(),
        status: "ok".to_string(),
        provider,
        utc: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for `GET /api/status/health`. Never key-gated.
pub async fn status_health_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<HealthResponse> {
    health_response(STATUS_SERVICE_NAME, state.provider)
}

/// Handler for `GET /api/query/health`. Never key-gated.
pub async fn query_health_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<HealthResponse> {
    health_response(QUERY_SERVICE_NAME, state.provider)
}

/// Handler for `POST /api/status/events`.
///
/// Responds `202 Accepted` with the result when stored and `400 Bad Request`
/// with the result when validation rejects the event. A body that is not a
/// valid event is a `400` with an `error` message.
pub async fn ingest_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<StatusEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestionResult>), ApiError> {
    let Json(event) = payload?;
    let ingestion = state.ingestion.clone();

    let result = run_blocking(move || ingestion.ingest(event)).await?;
    let status = if result.accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(result)))
}

/// Handler for `GET /api/status/summary` and `GET /api/query/summary`.
pub async fn summary_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Summary>, ApiError> {
    let query = state.query.clone();
    let summary = run_blocking(move || query.summary()).await?;
    Ok(Json(summary))
}

/// Handler for `GET /api/status/nodes` and `GET /api/query/nodes`.
pub async fn nodes_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<NodeStatus>>, ApiError> {
    let query = state.query.clone();
    let nodes = run_blocking(move || query.nodes()).await?;
    Ok(Json(nodes))
}

/// Query parameters for the node history endpoints.
#[derive(Debug, Deserialize)]
pub struct NodeEventsQuery {
    /// Maximum number of events (default: 100, clamped to 1..=1000).
    pub take: Option<i64>,
}

/// Handler for `GET /api/status/nodes/{nodeName}/events` and its
/// `/api/query` alias.
pub async fn node_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(node_name): Path<String>,
    Query(params): Query<NodeEventsQuery>,
) -> Result<Json<Vec<StatusEvent>>, ApiError> {
    let take = params.take.unwrap_or(DEFAULT_TAKE);
    let query = state.query.clone();

    let events = run_blocking(move || query.node_events(&node_name, take)).await?;
    Ok(Json(events))
}

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::AppState;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Returns `true` if `headers` satisfy the configured key.
///
/// A blank configured key authorizes every request. Otherwise the header
/// must be present and equal to the key byte for byte.
pub fn is_authorized(headers: &HeaderMap, configured_key: &str) -> bool {
    if configured_key.trim().is_empty() {
        return true;
    }

    match headers.get(API_KEY_HEADER) {
        Some(provided) => provided.as_bytes() == configured_key.as_bytes(),
        None => false,
    }
}

/// Middleware to reject requests without the configured `X-Api-Key`.
///
/// Applied to every route except the health endpoints.
pub async fn api_key_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    if !is_authorized(req.headers(), &state.api_key) {
        tracing::debug!(path = %req.uri().path(), "rejected request with missing or wrong api key");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

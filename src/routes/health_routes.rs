//! Health check endpoints.

use crate::state::AppState;
use axum::{response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness only. Answers 200 even when authentication is unconfigured;
/// `/status` carries the readiness detail.
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

//! Resolver status and route guard decisions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::state::AppState;

/// Registers status and guard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/guard", get(guard))
}

/// Reports configuration, the current session and every operation's loading
/// state. Answers 503 while authentication is not configured.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.resolver.status();
    let code = if status.configured {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

#[derive(Deserialize)]
struct GuardQuery {
    path: String,
}

async fn guard(State(state): State<AppState>, Query(query): Query<GuardQuery>) -> impl IntoResponse {
    let decision = state
        .guard
        .decide(&query.path, state.resolver.is_authenticated());
    Json(decision)
}

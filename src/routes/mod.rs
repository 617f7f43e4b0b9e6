//! HTTP route definitions and handlers.
//!
//! Routes are grouped by concern: the auth operations, session status and
//! route guard decisions, health checks and metrics exposition.

mod auth_routes;
mod health_routes;
mod metrics_routes;
mod session_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(session_routes::routes())
        .merge(health_routes::routes())
        .merge(metrics_routes::routes())
        .with_state(state)
}

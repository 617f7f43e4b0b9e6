//! Application startup and server initialization.
//!
//! Builds the session store, the resolver and its providers, restores any
//! persisted session, runs the initial session check and serves the routes.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ConfigV1;
use crate::guard::RouteGuard;
use crate::metrics::Metrics;
use crate::models::SessionCheck;
use crate::resolver::AuthResolver;
use crate::routes;
use crate::state::AppState;
use crate::store::create_store;

/// Wires the shared state from a loaded configuration.
pub fn build_state(config: Arc<ConfigV1>) -> AppState {
    let metrics = Metrics::new();
    let store = create_store(&config.session_store);
    let resolver = Arc::new(AuthResolver::new(&config.auth, store, metrics.clone()));
    let guard = Arc::new(RouteGuard::new(&config.guard));

    AppState {
        config,
        resolver,
        guard,
        metrics,
    }
}

/// Restores the persisted session and asks the primary provider whether it
/// still holds one.
pub async fn initialize_session(resolver: &AuthResolver) {
    if !resolver.is_configured() {
        warn!("Skipping session check, authentication is not configured");
        return;
    }
    resolver.restore().await;
    match resolver.get_current_session().await {
        Ok(SessionCheck::Active(session)) => info!(
            "Session active for '{}' via {} provider",
            session.email,
            session.provider.as_str()
        ),
        Ok(SessionCheck::NoSession) => info!("No active session"),
        Err(e) => warn!("Initial session check failed: {}", e),
    }
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the configured address
/// or encounters a runtime error while serving.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone());
    initialize_session(&state.resolver).await;

    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

//! Shared application state.
//!
//! Contains the state that is shared across all request handlers: the
//! configuration, the resolver owning the current session, the route guard
//! and the metrics registry.

use crate::config::ConfigV1;
use crate::guard::RouteGuard;
use crate::metrics::Metrics;
use crate::resolver::AuthResolver;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Dual-provider resolver; the single writer of the session.
    pub resolver: Arc<AuthResolver>,
    pub guard: Arc<RouteGuard>,
    pub metrics: Metrics,
}

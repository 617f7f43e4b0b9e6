use thiserror::Error;

use crate::providers::{FailureKind, ProviderFailure};

/// Terminal failure of a resolver operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Rejected locally; no provider was contacted.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    Network(String),
    #[error("authentication is not configured: {0}")]
    NotConfigured(String),
    #[error("{0}")]
    ProviderUnavailable(String),
    /// The provider refused a well-formed request.
    #[error("{0}")]
    Rejected(String),
    #[error("no active session")]
    NotAuthenticated,
    /// A newer call of the same class, or an explicit cancel, took over.
    #[error("operation was superseded or cancelled")]
    Cancelled,
}

impl AuthError {
    /// Stable identifier used in HTTP bodies, metrics and events.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::Network(_) => "network_error",
            AuthError::NotConfigured(_) => "not_configured",
            AuthError::ProviderUnavailable(_) => "provider_unavailable",
            AuthError::Rejected(_) => "rejected",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::Cancelled => "cancelled",
        }
    }
}

impl From<ProviderFailure> for AuthError {
    fn from(failure: ProviderFailure) -> Self {
        match failure.kind {
            FailureKind::InvalidCredentials => AuthError::InvalidCredentials(failure.message),
            FailureKind::Network => AuthError::Network(failure.message),
            FailureKind::Unavailable => AuthError::ProviderUnavailable(failure.message),
            FailureKind::Rejected => AuthError::Rejected(failure.message),
        }
    }
}

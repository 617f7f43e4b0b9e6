use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::resolver::AuthError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for HTTPError {
    fn from(error: AuthError) -> Self {
        let status = match &error {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials(_) | AuthError::NotAuthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Rejected(_) | AuthError::Cancelled => StatusCode::CONFLICT,
            AuthError::Network(_) => StatusCode::BAD_GATEWAY,
            AuthError::ProviderUnavailable(_) | AuthError::NotConfigured(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        HTTPError::new(status, error.kind(), error.to_string())
    }
}

/// Converts our `HTTPError` into a JSON response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

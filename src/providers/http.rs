//! Response handling shared by the HTTP-backed providers.

use reqwest::{Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::base::{FailureKind, ProviderFailure, ProviderResult};
use crate::models::Identity;

/// Classifies a transport error. Connection failures mean the provider is
/// unreachable; everything else is treated as a network problem.
pub fn map_send_error(provider: &str, e: reqwest::Error) -> ProviderFailure {
    if e.is_connect() {
        ProviderFailure::unavailable(format!("{} is unreachable: {}", provider, e))
    } else {
        ProviderFailure::network(format!("request to {} failed: {}", provider, e))
    }
}

/// Reads a JSON body, turning non-success statuses into a `ProviderFailure`.
///
/// `error_field` names the key the provider uses for its error message and
/// `client_error` is the kind reported for 400-class answers other than 401/403.
pub async fn read_json(
    provider: &str,
    response: Response,
    error_field: &str,
    client_error: FailureKind,
) -> ProviderResult<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderFailure::network(format!("error reading {} response: {}", provider, e)))?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body)
            .map_err(|e| ProviderFailure::network(format!("error parsing {} JSON: {}", provider, e)));
    }

    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get(error_field).and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("{} answered {}", provider, status));
    debug!(provider, status = status.as_u16(), "provider call failed: {}", message);

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::InvalidCredentials,
        s if s.is_server_error() => FailureKind::Unavailable,
        _ => client_error,
    };
    Err(ProviderFailure::new(kind, message))
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Adapts a user object into an `Identity`, looking at top-level fields first
/// and then at `user_metadata`.
pub fn identity_from_json(provider: &str, user: &Value) -> ProviderResult<Identity> {
    let metadata = user.get("user_metadata").cloned().unwrap_or(Value::Null);
    let id = match user.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ProviderFailure::network(format!(
                "{} returned a user without id",
                provider
            )))
        }
    };
    let email = str_field(user, &["email"]).ok_or_else(|| {
        ProviderFailure::network(format!("{} returned a user without email", provider))
    })?;

    Ok(Identity {
        id,
        email,
        name: str_field(user, &["name"]).or_else(|| str_field(&metadata, &["name", "full_name"])),
        avatar_url: str_field(user, &["avatar_url"])
            .or_else(|| str_field(&metadata, &["avatar_url", "picture"])),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_from_metadata() {
        let user = json!({
            "id": "abc",
            "email": "ana@urban.dev",
            "user_metadata": {"full_name": "Ana", "picture": "https://img/ana.png"}
        });
        let identity = identity_from_json("test", &user).unwrap();
        assert_eq!(identity.name.as_deref(), Some("Ana"));
        assert_eq!(identity.avatar_url.as_deref(), Some("https://img/ana.png"));
    }

    #[test]
    fn test_identity_numeric_id() {
        let user = json!({"id": 42, "email": "x@y.io"});
        assert_eq!(identity_from_json("test", &user).unwrap().id, "42");
    }

    #[test]
    fn test_identity_requires_email() {
        let user = json!({"id": "abc"});
        let err = identity_from_json("test", &user).unwrap_err();
        assert_eq!(err.kind, FailureKind::Network);
    }
}

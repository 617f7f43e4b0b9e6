use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::base::{FailureKind, PrimaryProvider, ProviderFailure, ProviderResult};
use super::http::{identity_from_json, map_send_error, read_json};
use crate::models::{Identity, ProfileFields, ProfileUpdate, SignUpReceipt};

/// Config for the Supabase-backed primary provider, reached through the
/// platform's `/supabase-auth` endpoints.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct SupabasePrimaryConfig {
    pub name: String,
    pub base_url: String,
}

/// Primary provider speaking to the `/supabase-auth` API. The session itself
/// lives in cookies kept by the client's cookie store.
pub struct SupabasePrimaryProvider {
    config: SupabasePrimaryConfig,
    client: Client,
}

impl SupabasePrimaryProvider {
    pub fn new(config: &SupabasePrimaryConfig) -> Self {
        info!(
            "Creating SupabasePrimaryProvider '{}' at '{}'",
            config.name, config.base_url
        );
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to a client without cookie store: {}", e);
                Client::new()
            });
        Self {
            config: config.clone(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/supabase-auth/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        client_error: FailureKind,
    ) -> ProviderResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(&self.config.name, e))?;
        read_json(&self.config.name, response, "error", client_error).await
    }

    fn user_from(&self, body: &Value) -> ProviderResult<Identity> {
        let user = body.get("user").unwrap_or(body);
        identity_from_json(&self.config.name, user)
    }
}

#[async_trait::async_trait]
impl PrimaryProvider for SupabasePrimaryProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> ProviderResult<SignUpReceipt> {
        debug!("Supabase sign-up for '{}'", email);
        let body = self
            .send(
                self.client
                    .post(self.url("signup"))
                    .json(&json!({"email": email, "password": password, "name": name})),
                FailureKind::Rejected,
            )
            .await?;
        let identity = self.user_from(&body)?;
        let session_established = body.get("session").map_or(false, |s| !s.is_null());
        Ok(SignUpReceipt {
            identity,
            session_established,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> ProviderResult<Identity> {
        debug!("Supabase sign-in for '{}'", email);
        let body = self
            .send(
                self.client
                    .post(self.url("signin"))
                    .json(&json!({"email": email, "password": password})),
                FailureKind::InvalidCredentials,
            )
            .await?;
        self.user_from(&body)
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.send(self.client.post(self.url("signout")), FailureKind::Rejected)
            .await
            .map(|_| ())
    }

    async fn get_session(&self) -> ProviderResult<bool> {
        let body = self
            .send(self.client.get(self.url("session")), FailureKind::Rejected)
            .await?;
        Ok(body.get("session").map_or(false, |s| !s.is_null()))
    }

    async fn get_current_user(&self) -> ProviderResult<Identity> {
        let body = self
            .send(self.client.get(self.url("user")), FailureKind::Rejected)
            .await?;
        self.user_from(&body)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> ProviderResult<ProfileFields> {
        let body = self
            .send(
                self.client.put(self.url("profile")).json(update),
                FailureKind::Rejected,
            )
            .await?;
        let user = body.get("user").cloned().unwrap_or(Value::Null);
        let metadata = user.get("user_metadata").cloned().unwrap_or(Value::Null);
        let pick = |key: &str| {
            user.get(key)
                .or_else(|| metadata.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Ok(ProfileFields {
            email: pick("email"),
            name: pick("name"),
            avatar_url: pick("avatar_url"),
        })
    }

    async fn reset_password(&self, email: &str) -> ProviderResult<()> {
        self.send(
            self.client
                .post(self.url("reset-password"))
                .json(&json!({"email": email})),
            FailureKind::Rejected,
        )
        .await
        .map(|_| ())
    }

    async fn update_password(&self, password: &str) -> ProviderResult<()> {
        self.send(
            self.client
                .put(self.url("password"))
                .json(&json!({"password": password})),
            FailureKind::Rejected,
        )
        .await
        .map(|_| ())
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> ProviderResult<String> {
        let body = self
            .send(
                self.client.get(self.url(&format!("oauth/{}", provider))),
                FailureKind::Rejected,
            )
            .await?;
        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderFailure::network("OAuth response did not contain a url"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn provider(url: String) -> SupabasePrimaryProvider {
        SupabasePrimaryProvider::new(&SupabasePrimaryConfig {
            name: "supabase".to_string(),
            base_url: url,
        })
    }

    #[tokio::test]
    async fn test_sign_in_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/supabase-auth/signin")
            .match_body(Matcher::Json(
                json!({"email": "a@b.com", "password": "Secret1!"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"user": {"id": "u1", "email": "a@b.com", "name": "Ana"}, "session": {}}"#)
            .create_async()
            .await;

        let identity = provider(server.url())
            .sign_in("a@b.com", "Secret1!")
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_sign_in_bad_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/supabase-auth/signin")
            .with_status(400)
            .with_body(r#"{"error": "Invalid login credentials"}"#)
            .create_async()
            .await;

        let err = provider(server.url())
            .sign_in("a@b.com", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidCredentials);
        assert_eq!(err.message, "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/supabase-auth/reset-password")
            .with_status(503)
            .create_async()
            .await;

        let err = provider(server.url())
            .reset_password("a@b.com")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Unavailable);
    }

    #[tokio::test]
    async fn test_sign_up_without_session_needs_verification() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/supabase-auth/signup")
            .with_status(200)
            .with_body(r#"{"user": {"id": "u2", "email": "new@b.com"}, "session": null}"#)
            .create_async()
            .await;

        let receipt = provider(server.url())
            .sign_up("new@b.com", "Secret1!", "New")
            .await
            .unwrap();
        assert!(!receipt.session_established);
        assert_eq!(receipt.identity.email, "new@b.com");
    }

    #[tokio::test]
    async fn test_get_session_absent() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/supabase-auth/session")
            .with_status(200)
            .with_body(r#"{"session": null}"#)
            .create_async()
            .await;

        assert!(!provider(server.url()).get_session().await.unwrap());
    }

    #[tokio::test]
    async fn test_oauth_url() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/supabase-auth/oauth/github")
            .with_status(200)
            .with_body(r#"{"url": "https://github.com/login/oauth/authorize?x=1"}"#)
            .create_async()
            .await;

        let url = provider(server.url())
            .sign_in_with_oauth("github")
            .await
            .unwrap();
        assert!(url.starts_with("https://github.com/"));
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        // Nothing listens on port 9 of localhost in the test environment.
        let err = provider("http://127.0.0.1:9".to_string())
            .sign_in("a@b.com", "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Unavailable);
    }
}

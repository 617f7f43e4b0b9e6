use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::base::{FailureKind, LegacyProvider, ProviderFailure, ProviderResult, SsoProvider};
use super::http::{identity_from_json, map_send_error, read_json};
use crate::models::{Identity, LegacyAccount};

/// Config for the chatflow platform's own account API.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct FlowiseLegacyConfig {
    pub name: String,
    /// API root, e.g. `http://localhost:3001/api/v1`.
    pub base_url: String,
    /// SSO integrations enabled on the platform.
    #[serde(default)]
    pub sso_providers: Vec<SsoProvider>,
}

/// Legacy provider backed by the platform's session login, account
/// registration and SSO endpoints.
pub struct FlowiseLegacyProvider {
    config: FlowiseLegacyConfig,
    client: Client,
}

impl FlowiseLegacyProvider {
    pub fn new(config: &FlowiseLegacyConfig) -> Self {
        info!(
            "Creating FlowiseLegacyProvider '{}' at '{}' with {} SSO provider(s)",
            config.name,
            config.base_url,
            config.sso_providers.len()
        );
        Self {
            config: config.clone(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: Value, client_error: FailureKind) -> ProviderResult<Value> {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(&self.config.name, e))?;
        read_json(&self.config.name, response, "message", client_error).await
    }
}

#[async_trait::async_trait]
impl LegacyProvider for FlowiseLegacyProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    async fn login(&self, email: &str, password: &str) -> ProviderResult<Identity> {
        debug!("Legacy login for '{}'", email);
        let body = self
            .post(
                "auth/login",
                json!({"email": email, "password": password}),
                FailureKind::InvalidCredentials,
            )
            .await?;
        identity_from_json(&self.config.name, &body)
    }

    async fn register_account(&self, account: &LegacyAccount) -> ProviderResult<Identity> {
        debug!("Legacy registration for '{}'", account.email);
        let body = self
            .post(
                "account/register",
                json!({ "user": account }),
                FailureKind::Rejected,
            )
            .await?;
        let user = body.get("user").unwrap_or(&body);
        identity_from_json(&self.config.name, user)
    }

    async fn forgot_password(&self, email: &str) -> ProviderResult<()> {
        self.post(
            "account/forgot-password",
            json!({"user": {"email": email}}),
            FailureKind::Rejected,
        )
        .await
        .map(|_| ())
    }

    fn sso_redirect(&self, provider: SsoProvider) -> ProviderResult<String> {
        if !self.config.sso_providers.contains(&provider) {
            return Err(ProviderFailure::rejected(format!(
                "SSO provider '{}' is not enabled",
                provider.as_str()
            )));
        }
        Ok(self.url(&format!("{}/login", provider.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn provider(url: String) -> FlowiseLegacyProvider {
        FlowiseLegacyProvider::new(&FlowiseLegacyConfig {
            name: "flowise".to_string(),
            base_url: url,
            sso_providers: vec![SsoProvider::Google, SsoProvider::Azure],
        })
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(r#"{"id": "u1", "email": "a@b.com", "name": "Ana"}"#)
            .create_async()
            .await;

        let identity = provider(server.url())
            .login("a@b.com", "pw")
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(identity.id, "u1");
    }

    #[tokio::test]
    async fn test_login_unauthorized_message() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"message": "Incorrect Email or Password"}"#)
            .create_async()
            .await;

        let err = provider(server.url()).login("a@b.com", "pw").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidCredentials);
        assert_eq!(err.message, "Incorrect Email or Password");
    }

    #[tokio::test]
    async fn test_register_wraps_user_and_referral() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/account/register")
            .match_body(Matcher::Json(json!({
                "user": {"name": "Ana", "email": "a@b.com", "credential": "Secret1!", "referral": "friend"}
            })))
            .with_status(201)
            .with_body(r#"{"user": {"id": "7", "email": "a@b.com", "name": "Ana"}}"#)
            .create_async()
            .await;

        let account = LegacyAccount {
            name: "Ana".to_string(),
            email: "a@b.com".to_string(),
            credential: "Secret1!".to_string(),
            referral: Some("friend".to_string()),
        };
        let identity = provider(server.url())
            .register_account(&account)
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(identity.id, "7");
    }

    #[tokio::test]
    async fn test_forgot_password_body() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/account/forgot-password")
            .match_body(Matcher::Json(json!({"user": {"email": "a@b.com"}})))
            .with_status(201)
            .create_async()
            .await;

        provider(server.url())
            .forgot_password("a@b.com")
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[test]
    fn test_sso_redirect_only_for_enabled() {
        let p = provider("http://localhost:3001/api/v1/".to_string());
        assert_eq!(
            p.sso_redirect(SsoProvider::Azure).unwrap(),
            "http://localhost:3001/api/v1/azure/login"
        );
        let err = p.sso_redirect(SsoProvider::Github).unwrap_err();
        assert_eq!(err.kind, FailureKind::Rejected);
    }
}

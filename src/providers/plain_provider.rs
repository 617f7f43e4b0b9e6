use std::sync::Mutex;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{LegacyProvider, ProviderFailure, ProviderResult, SsoProvider};
use crate::models::{Identity, LegacyAccount};

/// PlainLegacyConfig declares legacy accounts directly in the configuration.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct PlainLegacyConfig {
    /// A friendly name for logs.
    pub name: String,
    /// Whether new accounts may be registered at runtime.
    #[serde(default)]
    pub allow_registration: bool,
    pub users: Vec<PlainUserEntry>,
}

/// Represents a single account entry.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct PlainUserEntry {
    /// Stable subject id; generated when omitted.
    pub id: Option<String>,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

struct Account {
    id: String,
    email: String,
    password: String,
    name: Option<String>,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: None,
        }
    }
}

/// A legacy provider that checks credentials against configured accounts.
/// Useful for offline deployments and local development.
pub struct PlainLegacyProvider {
    name: String,
    allow_registration: bool,
    accounts: Mutex<Vec<Account>>,
}

impl PlainLegacyProvider {
    pub fn new(config: &PlainLegacyConfig) -> Self {
        info!(
            "Creating PlainLegacyProvider '{}' with {} account(s)",
            config.name,
            config.users.len()
        );
        let accounts = config
            .users
            .iter()
            .map(|entry| Account {
                id: entry
                    .id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                email: entry.email.to_lowercase(),
                password: entry.password.clone(),
                name: entry.name.clone(),
            })
            .collect();
        Self {
            name: config.name.clone(),
            allow_registration: config.allow_registration,
            accounts: Mutex::new(accounts),
        }
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, Vec<Account>> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LegacyProvider for PlainLegacyProvider {
    fn get_name(&self) -> &str {
        &self.name
    }

    async fn login(&self, email: &str, password: &str) -> ProviderResult<Identity> {
        let email = email.to_lowercase();
        debug!("Plain login attempt for '{}'", email);
        self.accounts()
            .iter()
            .find(|a| a.email == email && a.password == password)
            .map(Account::identity)
            .ok_or_else(|| ProviderFailure::invalid_credentials("Wrong email or password"))
    }

    async fn register_account(&self, account: &LegacyAccount) -> ProviderResult<Identity> {
        if !self.allow_registration {
            return Err(ProviderFailure::rejected("Registration is disabled"));
        }
        let email = account.email.to_lowercase();
        let mut accounts = self.accounts();
        if accounts.iter().any(|a| a.email == email) {
            return Err(ProviderFailure::rejected("Account already exists"));
        }
        let created = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            password: account.credential.clone(),
            name: Some(account.name.clone()),
        };
        let identity = created.identity();
        accounts.push(created);
        info!("Plain provider '{}' registered '{}'", self.name, identity.email);
        Ok(identity)
    }

    async fn forgot_password(&self, email: &str) -> ProviderResult<()> {
        // Accepted whether or not the account exists.
        warn!(
            "Plain provider '{}' cannot send reset emails; request for '{}' acknowledged",
            self.name, email
        );
        Ok(())
    }

    fn sso_redirect(&self, provider: SsoProvider) -> ProviderResult<String> {
        Err(ProviderFailure::rejected(format!(
            "SSO provider '{}' is not available on '{}'",
            provider.as_str(),
            self.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::FailureKind;

    fn create_test_config(allow_registration: bool) -> PlainLegacyConfig {
        PlainLegacyConfig {
            name: "TestPlain".to_string(),
            allow_registration,
            users: vec![PlainUserEntry {
                id: Some("u1".to_string()),
                email: "Adam@Example.com".to_string(),
                password: "admin".to_string(),
                name: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_on_email() {
        let provider = PlainLegacyProvider::new(&create_test_config(false));
        let identity = provider.login("adam@example.com", "admin").await.unwrap();
        assert_eq!(identity.id, "u1");
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let provider = PlainLegacyProvider::new(&create_test_config(false));
        let err = provider.login("adam@example.com", "nope").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_registration_disabled() {
        let provider = PlainLegacyProvider::new(&create_test_config(false));
        let account = LegacyAccount {
            name: "Eve".to_string(),
            email: "eve@example.com".to_string(),
            credential: "Secret1!".to_string(),
            referral: None,
        };
        assert!(provider.register_account(&account).await.is_err());
    }

    #[tokio::test]
    async fn test_registered_account_can_login() {
        let provider = PlainLegacyProvider::new(&create_test_config(true));
        let account = LegacyAccount {
            name: "Eve".to_string(),
            email: "eve@example.com".to_string(),
            credential: "Secret1!".to_string(),
            referral: None,
        };
        provider.register_account(&account).await.unwrap();
        let again = provider.register_account(&account).await.unwrap_err();
        assert_eq!(again.kind, FailureKind::Rejected);

        let identity = provider.login("eve@example.com", "Secret1!").await.unwrap();
        assert_eq!(identity.name.as_deref(), Some("Eve"));
    }
}

use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{
    flowise_provider::{FlowiseLegacyConfig, FlowiseLegacyProvider},
    plain_provider::{PlainLegacyConfig, PlainLegacyProvider},
    supabase_provider::{SupabasePrimaryConfig, SupabasePrimaryProvider},
};
use crate::models::{Identity, LegacyAccount, ProfileFields, ProfileUpdate, SignUpReceipt};

/// Coarse classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider understood the request and refused the credentials.
    InvalidCredentials,
    /// The request left but no usable answer came back (timeout, broken body).
    Network,
    /// The provider could not be reached or answered with a server error.
    Unavailable,
    /// The provider refused a well-formed request (duplicate account, weak password...).
    Rejected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidCredentials => "invalid_credentials",
            FailureKind::Network => "network",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Rejected => "rejected",
        }
    }
}

/// The failure half of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        ProviderFailure {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidCredentials, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.as_str())
    }
}

/// Tagged outcome of one provider call, consumed immediately by the resolver.
pub type ProviderResult<T> = Result<T, ProviderFailure>;

/// Legacy SSO integrations that can start a redirect flow.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SsoProvider {
    Google,
    Github,
    Azure,
    Auth0,
}

impl SsoProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoProvider::Google => "google",
            SsoProvider::Github => "github",
            SsoProvider::Azure => "azure",
            SsoProvider::Auth0 => "auth0",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "google" => Some(SsoProvider::Google),
            "github" => Some(SsoProvider::Github),
            "azure" => Some(SsoProvider::Azure),
            "auth0" => Some(SsoProvider::Auth0),
            _ => None,
        }
    }
}

/// The first-choice identity service, attempted for every operation.
#[async_trait::async_trait]
pub trait PrimaryProvider: Send + Sync {
    fn get_name(&self) -> &str;

    async fn sign_up(&self, email: &str, password: &str, name: &str)
        -> ProviderResult<SignUpReceipt>;
    async fn sign_in(&self, email: &str, password: &str) -> ProviderResult<Identity>;
    async fn sign_out(&self) -> ProviderResult<()>;
    /// Whether the provider currently holds a session for this client.
    async fn get_session(&self) -> ProviderResult<bool>;
    async fn get_current_user(&self) -> ProviderResult<Identity>;
    async fn update_profile(&self, update: &ProfileUpdate) -> ProviderResult<ProfileFields>;
    async fn reset_password(&self, email: &str) -> ProviderResult<()>;
    async fn update_password(&self, password: &str) -> ProviderResult<()>;
    /// Returns the external URL the user must be redirected to.
    async fn sign_in_with_oauth(&self, provider: &str) -> ProviderResult<String>;
}

/// The secondary identity service, only used for a fixed subset of operations.
#[async_trait::async_trait]
pub trait LegacyProvider: Send + Sync {
    fn get_name(&self) -> &str;

    async fn login(&self, email: &str, password: &str) -> ProviderResult<Identity>;
    async fn register_account(&self, account: &LegacyAccount) -> ProviderResult<Identity>;
    async fn forgot_password(&self, email: &str) -> ProviderResult<()>;
    /// Builds the redirect URL that starts an SSO flow with the given provider.
    fn sso_redirect(&self, provider: SsoProvider) -> ProviderResult<String>;
}

/// Configuration for the primary provider.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum PrimaryProviderConfig {
    #[serde(rename = "supabase")]
    Supabase(SupabasePrimaryConfig),
}

impl PrimaryProviderConfig {
    pub fn name(&self) -> &str {
        match self {
            PrimaryProviderConfig::Supabase(cfg) => &cfg.name,
        }
    }

    /// Returns a description of what is missing, if anything.
    pub fn missing_fields(&self) -> Option<String> {
        match self {
            PrimaryProviderConfig::Supabase(cfg) if cfg.base_url.trim().is_empty() => {
                Some(format!("primary provider '{}' has no base_url", cfg.name))
            }
            PrimaryProviderConfig::Supabase(_) => None,
        }
    }
}

/// Configuration for the legacy provider.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
#[serde(tag = "type")]
pub enum LegacyProviderConfig {
    #[serde(rename = "flowise")]
    Flowise(FlowiseLegacyConfig),
    #[serde(rename = "plain")]
    Plain(PlainLegacyConfig),
}

impl LegacyProviderConfig {
    pub fn name(&self) -> &str {
        match self {
            LegacyProviderConfig::Flowise(cfg) => &cfg.name,
            LegacyProviderConfig::Plain(cfg) => &cfg.name,
        }
    }
}

/// Create the primary provider from its config.
pub fn create_primary_provider(config: &PrimaryProviderConfig) -> Arc<dyn PrimaryProvider> {
    match config {
        PrimaryProviderConfig::Supabase(cfg) => Arc::new(SupabasePrimaryProvider::new(cfg)),
    }
}

/// Create the legacy provider from its config.
pub fn create_legacy_provider(config: &LegacyProviderConfig) -> Arc<dyn LegacyProvider> {
    match config {
        LegacyProviderConfig::Flowise(cfg) => Arc::new(FlowiseLegacyProvider::new(cfg)),
        LegacyProviderConfig::Plain(cfg) => Arc::new(PlainLegacyProvider::new(cfg)),
    }
}

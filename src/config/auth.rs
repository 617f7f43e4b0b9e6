use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::providers::{LegacyProviderConfig, PrimaryProviderConfig};

/// Deployment flavour of the platform. Decides whether sign-up may fall back
/// to the legacy provider.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformMode {
    #[default]
    OpenSource,
    Cloud,
    Enterprise,
}

impl PlatformMode {
    /// Lenient parser for environment overrides such as `PLATFORM_TYPE=ENTERPRISE`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enterprise" => Some(PlatformMode::Enterprise),
            "cloud" => Some(PlatformMode::Cloud),
            "open-source" | "opensource" | "open_source" | "simple" => {
                Some(PlatformMode::OpenSource)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformMode::OpenSource => "open-source",
            PlatformMode::Cloud => "cloud",
            PlatformMode::Enterprise => "enterprise",
        }
    }

    /// Legacy registration only exists on enterprise and cloud deployments.
    pub fn allows_sign_up_fallback(&self) -> bool {
        matches!(self, PlatformMode::Enterprise | PlatformMode::Cloud)
    }

    /// Whether a legacy registration yields a session right away.
    /// Cloud deployments require email verification first.
    pub fn legacy_sign_up_establishes_session(&self) -> bool {
        matches!(self, PlatformMode::Enterprise)
    }
}

/// Process-wide authentication configuration. Read-only after startup.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, Default)]
pub struct AuthConfiguration {
    #[serde(default)]
    pub mode: PlatformMode,
    /// Optional timeout wrapped around every provider call.
    pub timeout_in_ms: Option<u64>,
    pub primary: Option<PrimaryProviderConfig>,
    pub fallback: Option<LegacyProviderConfig>,
}

impl AuthConfiguration {
    /// Returns why the configuration cannot serve requests, if it cannot.
    pub fn readiness(&self) -> Result<(), String> {
        match &self.primary {
            None => Err("no primary identity provider is configured".to_string()),
            Some(primary) => match primary.missing_fields() {
                Some(missing) => Err(missing),
                None => Ok(()),
            },
        }
    }

    pub fn sign_up_fallback(&self) -> bool {
        self.mode.allows_sign_up_fallback() && self.fallback.is_some()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_in_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

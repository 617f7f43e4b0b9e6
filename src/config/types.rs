use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AuthConfiguration, PlatformMode};
use super::logging::LoggingConfig;
use crate::guard::GuardConfig;
use crate::store::SessionStoreConfig;

/// Prefix for environment overrides, e.g. `DUALAUTH_AUTH__TIMEOUT_IN_MS=2000`.
pub const ENV_PREFIX: &str = "DUALAUTH_";

/// Environment variable selecting the platform mode, kept for compatibility
/// with existing deployments.
pub const PLATFORM_TYPE_VAR: &str = "PLATFORM_TYPE";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfiguration,
    #[serde(default)]
    pub session_store: SessionStoreConfig,
    #[serde(default)]
    pub guard: GuardConfig,
}

fn extract(figment: Figment) -> Result<ConfigV1, figment::Error> {
    let Config::ConfigV1(mut config) = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract::<Config>()?;

    if let Ok(value) = std::env::var(PLATFORM_TYPE_VAR) {
        match PlatformMode::parse(&value) {
            Some(mode) => {
                info!("{} overrides platform mode to '{}'", PLATFORM_TYPE_VAR, mode.as_str());
                config.auth.mode = mode;
            }
            None => tracing::warn!("Ignoring unknown {} '{}'", PLATFORM_TYPE_VAR, value),
        }
    }
    Ok(config)
}

/// Load config from a YAML file, merged with `DUALAUTH_` environment variables.
pub fn load_config(path: impl AsRef<Path>) -> Result<ConfigV1, figment::Error> {
    extract(Figment::new().merge(Yaml::file(path.as_ref())))
}

/// Load config from an in-memory YAML document.
pub fn load_config_from_str(yaml: &str) -> Result<ConfigV1, figment::Error> {
    extract(Figment::new().merge(Yaml::string(yaml)))
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render schema: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LegacyProviderConfig, PrimaryProviderConfig};

    const FULL_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:8080
logging:
  level: debug
  format: json
auth:
  mode: cloud
  timeout_in_ms: 2500
  primary:
    type: supabase
    name: supabase
    base_url: http://localhost:3001/api/v1
  fallback:
    type: flowise
    name: flowise
    base_url: http://localhost:3001/api/v1
    sso_providers: [google, azure]
session_store:
  type: file
  path: /tmp/dualauth/session.json
guard:
  protected_routes: ["/dashboard", "/settings"]
"#;

    #[test]
    fn test_full_config_parses() {
        let config = load_config_from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.auth.mode, PlatformMode::Cloud);
        assert!(matches!(
            config.auth.primary,
            Some(PrimaryProviderConfig::Supabase(_))
        ));
        match config.auth.fallback {
            Some(LegacyProviderConfig::Flowise(ref flowise)) => {
                assert_eq!(flowise.sso_providers.len(), 2)
            }
            _ => panic!("expected flowise fallback"),
        }
        assert!(matches!(config.session_store, SessionStoreConfig::File(_)));
        assert_eq!(config.guard.protected_routes.len(), 2);
        assert_eq!(config.guard.login_path, "/login");
    }

    #[test]
    fn test_minimal_config_is_unconfigured() {
        let config = load_config_from_str("version: \"1.0.0\"\nbind_address: 0.0.0.0:8080\n").unwrap();
        assert!(config.auth.primary.is_none());
        assert!(config.auth.readiness().is_err());
        assert!(matches!(config.session_store, SessionStoreConfig::Memory));
    }

    #[test]
    fn test_unknown_version_rejected() {
        assert!(load_config_from_str("version: \"9.9.9\"\nbind_address: x\n").is_err());
    }
}

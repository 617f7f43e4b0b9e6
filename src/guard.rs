//! Redirect policy for protected and authentication pages.
//!
//! Unauthenticated visitors of a protected route are sent to the login page
//! with a `redirectTo` parameter; authenticated visitors of a login or
//! register page are sent to the dashboard.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct GuardConfig {
    #[serde(default = "default_protected_routes")]
    pub protected_routes: Vec<String>,
    #[serde(default = "default_auth_routes")]
    pub auth_routes: Vec<String>,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
}

fn default_protected_routes() -> Vec<String> {
    vec!["/dashboard".to_string()]
}

fn default_auth_routes() -> Vec<String> {
    vec!["/login".to_string(), "/register".to_string()]
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_dashboard_path() -> String {
    "/dashboard".to_string()
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            protected_routes: default_protected_routes(),
            auth_routes: default_auth_routes(),
            login_path: default_login_path(),
            dashboard_path: default_dashboard_path(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    Redirect { location: String },
}

pub struct RouteGuard {
    config: GuardConfig,
}

impl RouteGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn matches(prefixes: &[String], path: &str) -> bool {
        prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    pub fn decide(&self, path: &str, is_authenticated: bool) -> GuardDecision {
        if !is_authenticated && Self::matches(&self.config.protected_routes, path) {
            return GuardDecision::Redirect {
                location: format!(
                    "{}?redirectTo={}",
                    self.config.login_path,
                    urlencoding::encode(path)
                ),
            };
        }
        if is_authenticated && Self::matches(&self.config.auth_routes, path) {
            return GuardDecision::Redirect {
                location: self.config.dashboard_path.clone(),
            };
        }
        GuardDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_route_redirects_anonymous() {
        let guard = RouteGuard::new(&GuardConfig::default());
        assert_eq!(
            guard.decide("/dashboard/analytics", false),
            GuardDecision::Redirect {
                location: "/login?redirectTo=%2Fdashboard%2Fanalytics".to_string()
            }
        );
        assert_eq!(guard.decide("/dashboard", true), GuardDecision::Allow);
    }

    #[test]
    fn test_auth_route_redirects_signed_in_user() {
        let guard = RouteGuard::new(&GuardConfig::default());
        assert_eq!(
            guard.decide("/register", true),
            GuardDecision::Redirect {
                location: "/dashboard".to_string()
            }
        );
        assert_eq!(guard.decide("/login", false), GuardDecision::Allow);
    }

    #[test]
    fn test_public_routes_pass() {
        let guard = RouteGuard::new(&GuardConfig::default());
        assert_eq!(guard.decide("/", false), GuardDecision::Allow);
        assert_eq!(guard.decide("/pricing", true), GuardDecision::Allow);
    }

    #[test]
    fn test_redirect_target_is_encoded() {
        let guard = RouteGuard::new(&GuardConfig::default());
        let GuardDecision::Redirect { location } = guard.decide("/dashboard?tab=a b&x=1", false) else {
            panic!("expected redirect");
        };
        assert_eq!(location, "/login?redirectTo=%2Fdashboard%3Ftab%3Da%20b%26x%3D1");
    }
}

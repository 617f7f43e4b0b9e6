#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use dualauth::config::{load_config_from_str, AuthConfiguration, ConfigV1, PlatformMode};
use dualauth::metrics::Metrics;
use dualauth::models::{Identity, LegacyAccount, ProfileFields, ProfileUpdate, SignUpReceipt};
use dualauth::providers::{
    LegacyProvider, PrimaryProvider, ProviderFailure, ProviderResult, SsoProvider,
};
use dualauth::resolver::AuthResolver;
use dualauth::routes::create_router;
use dualauth::startup::build_state;
use dualauth::store::memory_store::MemoryStore;
use serde_json::Value;
use tokio::sync::Notify;

struct Step<T> {
    gate: Option<Arc<Notify>>,
    result: ProviderResult<T>,
}

/// Queue of canned answers for one provider method. An optional gate holds
/// the answer back until the test releases it.
pub struct Script<T> {
    steps: Mutex<VecDeque<Step<T>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Script {
            steps: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Script<T> {
    pub fn push(&self, result: ProviderResult<T>) {
        self.steps
            .lock()
            .unwrap()
            .push_back(Step { gate: None, result });
    }

    pub fn push_gated(&self, result: ProviderResult<T>, gate: Arc<Notify>) {
        self.steps.lock().unwrap().push_back(Step {
            gate: Some(gate),
            result,
        });
    }

    async fn next(&self) -> ProviderResult<T> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step { gate, result }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                result
            }
            None => Err(ProviderFailure::unavailable("no scripted answer")),
        }
    }
}

#[derive(Default)]
struct CallLog {
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl CallLog {
    fn hit(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
    }

    fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[derive(Default)]
pub struct ScriptedPrimary {
    pub sign_up: Script<SignUpReceipt>,
    pub sign_in: Script<Identity>,
    pub sign_out: Script<()>,
    pub get_session: Script<bool>,
    pub current_user: Script<Identity>,
    pub update_profile: Script<ProfileFields>,
    pub reset_password: Script<()>,
    pub update_password: Script<()>,
    pub oauth: Script<String>,
    log: CallLog,
}

impl ScriptedPrimary {
    pub fn calls(&self, method: &str) -> usize {
        self.log.count(method)
    }

    pub fn total_calls(&self) -> usize {
        self.log.total()
    }
}

#[async_trait]
impl PrimaryProvider for ScriptedPrimary {
    fn get_name(&self) -> &str {
        "scripted-primary"
    }

    async fn sign_up(&self, _: &str, _: &str, _: &str) -> ProviderResult<SignUpReceipt> {
        self.log.hit("sign_up");
        self.sign_up.next().await
    }

    async fn sign_in(&self, _: &str, _: &str) -> ProviderResult<Identity> {
        self.log.hit("sign_in");
        self.sign_in.next().await
    }

    async fn sign_out(&self) -> ProviderResult<()> {
        self.log.hit("sign_out");
        self.sign_out.next().await
    }

    async fn get_session(&self) -> ProviderResult<bool> {
        self.log.hit("get_session");
        self.get_session.next().await
    }

    async fn get_current_user(&self) -> ProviderResult<Identity> {
        self.log.hit("get_current_user");
        self.current_user.next().await
    }

    async fn update_profile(&self, _: &ProfileUpdate) -> ProviderResult<ProfileFields> {
        self.log.hit("update_profile");
        self.update_profile.next().await
    }

    async fn reset_password(&self, _: &str) -> ProviderResult<()> {
        self.log.hit("reset_password");
        self.reset_password.next().await
    }

    async fn update_password(&self, _: &str) -> ProviderResult<()> {
        self.log.hit("update_password");
        self.update_password.next().await
    }

    async fn sign_in_with_oauth(&self, _: &str) -> ProviderResult<String> {
        self.log.hit("sign_in_with_oauth");
        self.oauth.next().await
    }
}

#[derive(Default)]
pub struct ScriptedLegacy {
    pub login: Script<Identity>,
    pub register: Script<Identity>,
    pub forgot_password: Script<()>,
    log: CallLog,
}

impl ScriptedLegacy {
    pub fn calls(&self, method: &str) -> usize {
        self.log.count(method)
    }

    pub fn total_calls(&self) -> usize {
        self.log.total()
    }
}

#[async_trait]
impl LegacyProvider for ScriptedLegacy {
    fn get_name(&self) -> &str {
        "scripted-legacy"
    }

    async fn login(&self, _: &str, _: &str) -> ProviderResult<Identity> {
        self.log.hit("login");
        self.login.next().await
    }

    async fn register_account(&self, _: &LegacyAccount) -> ProviderResult<Identity> {
        self.log.hit("register_account");
        self.register.next().await
    }

    async fn forgot_password(&self, _: &str) -> ProviderResult<()> {
        self.log.hit("forgot_password");
        self.forgot_password.next().await
    }

    fn sso_redirect(&self, provider: SsoProvider) -> ProviderResult<String> {
        Ok(format!("https://legacy.example.com/{}/login", provider.as_str()))
    }
}

pub fn identity(id: &str, email: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: email.to_string(),
        name: None,
        avatar_url: None,
    }
}

pub fn build_resolver(
    mode: PlatformMode,
    primary: &Arc<ScriptedPrimary>,
    legacy: Option<&Arc<ScriptedLegacy>>,
) -> Arc<AuthResolver> {
    let config = AuthConfiguration {
        mode,
        ..AuthConfiguration::default()
    };
    let legacy = legacy.map(|l| l.clone() as Arc<dyn LegacyProvider>);
    Arc::new(AuthResolver::with_providers(
        &config,
        primary.clone(),
        legacy,
        Arc::new(MemoryStore::new()),
        Metrics::new(),
    ))
}

pub fn build_app(yaml: &str) -> Router {
    let config: ConfigV1 = load_config_from_str(yaml).expect("Failed to parse test config YAML");
    create_router(build_state(Arc::new(config)))
}

pub fn json_request(method: Method, path: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(path);
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

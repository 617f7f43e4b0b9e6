use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::hub::{AuthEvent, SessionHub};
use super::operation::{OperationClass, OperationStatus, OperationTracker, Step, Ticket};
use super::validation::{validate_email, validate_password, validate_sign_in, validate_sign_up};
use crate::config::{AuthConfiguration, PlatformMode};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{
    Identity, LegacyAccount, ProfileUpdate, ProviderOrigin, Session, SessionCheck, SignUpOutcome,
    SignUpRequest,
};
use crate::providers::{
    create_legacy_provider, create_primary_provider, LegacyProvider, PrimaryProvider,
    ProviderFailure, ProviderResult, SsoProvider,
};
use crate::store::{SessionSlot, SessionStore};
use crate::utils::log_throttle::LogThrottle;

const FALLBACK_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Operations whose completion can write the current session.
const SESSION_WRITERS: [OperationClass; 3] = [
    OperationClass::SignIn,
    OperationClass::SignUp,
    OperationClass::GetCurrentSession,
];

struct Providers {
    primary: Arc<dyn PrimaryProvider>,
    legacy: Option<Arc<dyn LegacyProvider>>,
}

enum Readiness {
    Ready(Providers),
    /// Holds the reason the configuration cannot serve requests.
    Unconfigured(String),
}

/// Snapshot of the resolver exposed on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ResolverStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub mode: PlatformMode,
    pub primary: Option<String>,
    pub fallback: Option<String>,
    pub sign_up_fallback: bool,
    pub is_authenticated: bool,
    pub session: Option<Session>,
    pub operations: Vec<OperationStatus>,
}

/// Owns the current session and decides, per operation, which identity
/// provider serves it and how failures cascade to the legacy provider.
pub struct AuthResolver {
    readiness: Readiness,
    mode: PlatformMode,
    timeout: Option<Duration>,
    tracker: Arc<OperationTracker>,
    hub: SessionHub,
    store: Arc<dyn SessionStore>,
    persist_lock: Mutex<()>,
    metrics: Metrics,
    fallback_log: LogThrottle,
}

impl AuthResolver {
    /// Build the providers described by the configuration. A missing or
    /// incomplete primary provider leaves the resolver unconfigured.
    pub fn new(config: &AuthConfiguration, store: Arc<dyn SessionStore>, metrics: Metrics) -> Self {
        let primary = config.readiness().and_then(|_| {
            config
                .primary
                .as_ref()
                .ok_or_else(|| "no primary identity provider is configured".to_string())
        });

        let readiness = match primary {
            Ok(primary_config) => {
                info!("Creating primary provider '{}'...", primary_config.name());
                let legacy = config.fallback.as_ref().map(|fallback| {
                    info!("Creating legacy provider '{}'...", fallback.name());
                    create_legacy_provider(fallback)
                });
                info!(
                    "Platform mode '{}', sign-up fallback {}",
                    config.mode.as_str(),
                    if config.sign_up_fallback() { "enabled" } else { "disabled" }
                );
                Readiness::Ready(Providers {
                    primary: create_primary_provider(primary_config),
                    legacy,
                })
            }
            Err(reason) => {
                warn!(
                    event_name = "resolver.unconfigured",
                    event_domain = "resolver",
                    "Authentication is not configured: {}",
                    reason
                );
                Readiness::Unconfigured(reason)
            }
        };

        Self::assemble(readiness, config, store, metrics)
    }

    /// Build a resolver around already constructed providers.
    pub fn with_providers(
        config: &AuthConfiguration,
        primary: Arc<dyn PrimaryProvider>,
        legacy: Option<Arc<dyn LegacyProvider>>,
        store: Arc<dyn SessionStore>,
        metrics: Metrics,
    ) -> Self {
        Self::assemble(
            Readiness::Ready(Providers { primary, legacy }),
            config,
            store,
            metrics,
        )
    }

    fn assemble(
        readiness: Readiness,
        config: &AuthConfiguration,
        store: Arc<dyn SessionStore>,
        metrics: Metrics,
    ) -> Self {
        AuthResolver {
            readiness,
            mode: config.mode,
            timeout: config.timeout(),
            tracker: Arc::new(OperationTracker::new()),
            hub: SessionHub::new(),
            store,
            persist_lock: Mutex::new(()),
            metrics,
            fallback_log: LogThrottle::new(FALLBACK_LOG_INTERVAL),
        }
    }

    // -- Accessors

    pub fn is_configured(&self) -> bool {
        matches!(self.readiness, Readiness::Ready(_))
    }

    pub fn mode(&self) -> PlatformMode {
        self.mode
    }

    pub fn current_session(&self) -> Option<Session> {
        self.hub.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.hub.is_authenticated()
    }

    /// Current-value view of the session, for route guards.
    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.hub.watch()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.hub.subscribe()
    }

    pub fn operation_status(&self, class: OperationClass) -> OperationStatus {
        self.tracker.status(class)
    }

    pub fn is_loading(&self, class: OperationClass) -> bool {
        self.tracker.is_loading(class)
    }

    pub fn status(&self) -> ResolverStatus {
        let (reason, primary, fallback, legacy_present) = match &self.readiness {
            Readiness::Ready(providers) => (
                None,
                Some(providers.primary.get_name().to_string()),
                providers.legacy.as_ref().map(|l| l.get_name().to_string()),
                providers.legacy.is_some(),
            ),
            Readiness::Unconfigured(reason) => (Some(reason.clone()), None, None, false),
        };
        let session = self.hub.current();
        ResolverStatus {
            configured: self.is_configured(),
            reason,
            mode: self.mode,
            primary,
            fallback,
            sign_up_fallback: self.mode.allows_sign_up_fallback() && legacy_present,
            is_authenticated: session.is_some(),
            session,
            operations: OperationClass::ALL
                .iter()
                .map(|class| self.tracker.status(*class))
                .collect(),
        }
    }

    // -- Operations

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let started = Instant::now();
        let result = self.run_sign_in(email.trim(), password).await;
        self.finish(OperationClass::SignIn.as_str(), started, result)
    }

    async fn run_sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let op = OperationClass::SignIn;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        validate_sign_in(email, password).map_err(|e| self.refuse(op, e))?;

        let ticket = self.tracker.begin(op, providers.legacy.is_some());
        let fallback = providers
            .legacy
            .as_ref()
            .map(|legacy| (legacy.get_name(), move || legacy.login(email, password)));

        let (identity, origin) = match self
            .attempt(&ticket, providers, providers.primary.sign_in(email, password), fallback)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(&ticket, e)),
        };

        let session = Session::from_identity(identity, origin);
        self.commit(&ticket, Some(session.clone())).await?;
        info!(
            event_name = "resolver.sign_in.succeeded",
            event_domain = "resolver",
            provider = origin.as_str(),
            "User '{}' signed in",
            session.email
        );
        Ok(session)
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        let started = Instant::now();
        let result = self.run_sign_up(request).await;
        self.finish(OperationClass::SignUp.as_str(), started, result)
    }

    async fn run_sign_up(&self, mut request: SignUpRequest) -> Result<SignUpOutcome, AuthError> {
        let op = OperationClass::SignUp;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        request.email = request.email.trim().to_string();
        validate_sign_up(&request).map_err(|e| self.refuse(op, e))?;

        let sign_up_fallback = self.mode.allows_sign_up_fallback();
        let establishes = self.mode.legacy_sign_up_establishes_session();
        let ticket = self
            .tracker
            .begin(op, op.has_fallback(sign_up_fallback) && providers.legacy.is_some());

        let primary = async {
            providers
                .primary
                .sign_up(&request.email, &request.password, request.name.trim())
                .await
                .map(|receipt| (receipt.identity, receipt.session_established))
        };
        let account = LegacyAccount::from(&request);
        let fallback = providers
            .legacy
            .as_ref()
            .filter(|_| sign_up_fallback)
            .map(|legacy| {
                (legacy.get_name(), move || async move {
                    legacy
                        .register_account(&account)
                        .await
                        .map(|identity| (identity, establishes))
                })
            });

        let ((identity, established), origin) =
            match self.attempt(&ticket, providers, primary, fallback).await {
                Ok(resolved) => resolved,
                Err(e) => return Err(self.fail(&ticket, e)),
            };

        if established {
            let session = Session::from_identity(identity, origin);
            self.commit(&ticket, Some(session.clone())).await?;
            info!(
                event_name = "resolver.sign_up.established",
                event_domain = "resolver",
                provider = origin.as_str(),
                "Registered and signed in '{}'",
                session.email
            );
            return Ok(SignUpOutcome::Established { session });
        }

        if !ticket.succeed(|| ()) {
            return Err(AuthError::Cancelled);
        }
        info!(
            event_name = "resolver.sign_up.pending",
            event_domain = "resolver",
            provider = origin.as_str(),
            "Registered '{}', awaiting email verification",
            identity.email
        );
        Ok(SignUpOutcome::PendingVerification {
            email: identity.email,
        })
    }

    /// Clears the local session first, then asks the primary to end its own
    /// session. A remote failure is logged and never surfaced.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let started = Instant::now();
        let result = self.run_sign_out().await;
        self.finish(OperationClass::SignOut.as_str(), started, result)
    }

    async fn run_sign_out(&self) -> Result<(), AuthError> {
        let op = OperationClass::SignOut;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        let ticket = self.tracker.begin(op, false);

        self.supersede_session_writers();
        self.hub.publish(None);
        self.persist().await;

        let primary = &providers.primary;
        if let Err(failure) = self
            .call_provider(op, ProviderOrigin::Primary, primary.get_name(), primary.sign_out())
            .await
        {
            warn!(
                event_name = "resolver.sign_out.remote_failed",
                event_domain = "resolver",
                provider = primary.get_name(),
                "Remote sign-out failed, local session already cleared: {}",
                failure
            );
        }
        ticket.succeed(|| ());
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let started = Instant::now();
        let result = self.run_reset_password(email.trim()).await;
        self.finish(OperationClass::ResetPassword.as_str(), started, result)
    }

    async fn run_reset_password(&self, email: &str) -> Result<(), AuthError> {
        let op = OperationClass::ResetPassword;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        validate_email(email).map_err(|e| self.refuse(op, e))?;

        let ticket = self.tracker.begin(op, providers.legacy.is_some());
        let fallback = providers
            .legacy
            .as_ref()
            .map(|legacy| (legacy.get_name(), move || legacy.forgot_password(email)));

        let ((), origin) = match self
            .attempt(&ticket, providers, providers.primary.reset_password(email), fallback)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => return Err(self.fail(&ticket, e)),
        };
        if !ticket.succeed(|| ()) {
            return Err(AuthError::Cancelled);
        }
        info!(
            event_name = "resolver.reset_password.accepted",
            event_domain = "resolver",
            provider = origin.as_str(),
            "Password reset requested for '{}'",
            email
        );
        Ok(())
    }

    pub async fn update_password(&self, password: &str) -> Result<(), AuthError> {
        let started = Instant::now();
        let result = self.run_update_password(password).await;
        self.finish(OperationClass::UpdatePassword.as_str(), started, result)
    }

    async fn run_update_password(&self, password: &str) -> Result<(), AuthError> {
        let op = OperationClass::UpdatePassword;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        validate_password(password).map_err(|e| self.refuse(op, e))?;

        let ticket = self.tracker.begin(op, false);
        if let Err(e) = self
            .attempt_primary(&ticket, providers, providers.primary.update_password(password))
            .await
        {
            return Err(self.fail(&ticket, e));
        }
        if !ticket.succeed(|| ()) {
            return Err(AuthError::Cancelled);
        }
        Ok(())
    }

    /// Sends the update to the primary and merges the fields it echoes back
    /// into the current session.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Session, AuthError> {
        let started = Instant::now();
        let result = self.run_update_profile(update).await;
        self.finish(OperationClass::UpdateProfile.as_str(), started, result)
    }

    async fn run_update_profile(&self, update: ProfileUpdate) -> Result<Session, AuthError> {
        let op = OperationClass::UpdateProfile;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        if update.is_empty() {
            return Err(self.refuse(op, AuthError::Validation("Nothing to update".to_string())));
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(self.refuse(op, AuthError::Validation("Name cannot be empty".to_string())));
        }
        if !self.hub.is_authenticated() {
            return Err(self.refuse(op, AuthError::NotAuthenticated));
        }

        let ticket = self.tracker.begin(op, false);
        let fields = match self
            .attempt_primary(&ticket, providers, providers.primary.update_profile(&update))
            .await
        {
            Ok(fields) => fields,
            Err(e) => return Err(self.fail(&ticket, e)),
        };

        let mut merged = None;
        let committed = ticket.succeed(|| {
            if let Some(mut session) = self.hub.current() {
                session.merge_profile(fields);
                self.hub.publish(Some(session.clone()));
                merged = Some(session);
            }
        });
        if !committed {
            return Err(AuthError::Cancelled);
        }
        match merged {
            Some(session) => {
                self.persist().await;
                Ok(session)
            }
            // Signed out while the update was in flight.
            None => Err(self.refuse(op, AuthError::NotAuthenticated)),
        }
    }

    /// Asks the primary whether it still holds a session. Provider errors are
    /// silent: the caller gets the current session, if any.
    pub async fn get_current_session(&self) -> Result<SessionCheck, AuthError> {
        let started = Instant::now();
        let result = self.run_get_current_session().await;
        self.finish(OperationClass::GetCurrentSession.as_str(), started, result)
    }

    async fn run_get_current_session(&self) -> Result<SessionCheck, AuthError> {
        let op = OperationClass::GetCurrentSession;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        let ticket = self.tracker.begin(op, false);

        let primary = &providers.primary;
        match self
            .call_provider(
                op,
                ProviderOrigin::Primary,
                primary.get_name(),
                lookup_primary_session(primary.as_ref()),
            )
            .await
        {
            Ok(Some(identity)) => {
                ticket.advance(Step::PrimarySucceeded);
                let mut session = Session::from_identity(identity, ProviderOrigin::Primary);
                let mut changed = false;
                let committed = ticket.succeed(|| {
                    let current = self.hub.current();
                    if let Some(existing) = current
                        .as_ref()
                        .filter(|c| c.id == session.id && c.provider == session.provider)
                    {
                        session.issued_at = existing.issued_at;
                    }
                    if current.as_ref() != Some(&session) {
                        self.hub.publish(Some(session.clone()));
                        changed = true;
                    }
                });
                if !committed {
                    return Err(AuthError::Cancelled);
                }
                if changed {
                    self.persist().await;
                }
                Ok(SessionCheck::Active(session))
            }
            Ok(None) => {
                ticket.advance(Step::PrimarySucceeded);
                let mut outcome = SessionCheck::NoSession;
                let mut changed = false;
                let committed = ticket.succeed(|| match self.hub.current() {
                    // The primary knows nothing about legacy sessions.
                    Some(current) if current.provider == ProviderOrigin::Fallback => {
                        outcome = SessionCheck::Active(current)
                    }
                    Some(_) => {
                        self.hub.publish(None);
                        changed = true;
                    }
                    None => {}
                });
                if !committed {
                    return Err(AuthError::Cancelled);
                }
                if changed {
                    info!(
                        event_name = "resolver.session.expired",
                        event_domain = "resolver",
                        "Primary provider no longer holds a session, cleared locally"
                    );
                    self.persist().await;
                }
                Ok(outcome)
            }
            Err(failure) => {
                debug!(
                    event_name = "resolver.session.check_failed",
                    event_domain = "resolver",
                    provider = primary.get_name(),
                    "Session check failed, keeping local state: {}",
                    failure
                );
                if !ticket.succeed(|| ()) {
                    return Err(AuthError::Cancelled);
                }
                Ok(self
                    .hub
                    .current()
                    .map_or(SessionCheck::NoSession, SessionCheck::Active))
            }
        }
    }

    /// Returns the URL the user must be redirected to for an OAuth sign-in.
    pub async fn sign_in_with_oauth(&self, provider: &str) -> Result<String, AuthError> {
        let started = Instant::now();
        let result = self.run_sign_in_with_oauth(provider.trim()).await;
        self.finish(OperationClass::OAuthSignIn.as_str(), started, result)
    }

    async fn run_sign_in_with_oauth(&self, provider: &str) -> Result<String, AuthError> {
        let op = OperationClass::OAuthSignIn;
        let providers = self.ready().map_err(|e| self.refuse(op, e))?;
        let well_formed = !provider.is_empty()
            && provider
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            return Err(self.refuse(
                op,
                AuthError::Validation(format!("Unsupported OAuth provider '{}'", provider)),
            ));
        }

        let ticket = self.tracker.begin(op, false);
        let url = match self
            .attempt_primary(&ticket, providers, providers.primary.sign_in_with_oauth(provider))
            .await
        {
            Ok(url) => url,
            Err(e) => return Err(self.fail(&ticket, e)),
        };
        if !ticket.succeed(|| ()) {
            return Err(AuthError::Cancelled);
        }
        Ok(url)
    }

    /// Builds the legacy SSO redirect for one of the enabled SSO providers.
    pub fn sso_redirect(&self, provider: &str) -> Result<String, AuthError> {
        let started = Instant::now();
        let result = self.run_sso_redirect(provider);
        self.finish("sso_redirect", started, result)
    }

    fn run_sso_redirect(&self, provider: &str) -> Result<String, AuthError> {
        let providers = self.ready()?;
        let sso = SsoProvider::parse(provider.trim()).ok_or_else(|| {
            AuthError::Validation(format!("Unknown SSO provider '{}'", provider))
        })?;
        let legacy = providers.legacy.as_ref().ok_or_else(|| {
            AuthError::NotConfigured("no legacy provider is configured for SSO".to_string())
        })?;
        Ok(legacy.sso_redirect(sso)?)
    }

    /// Drops the session after a downstream service rejected it. No provider
    /// is contacted. Returns whether a session was present.
    pub async fn invalidate(&self) -> bool {
        self.supersede_session_writers();
        let Some(session) = self.hub.current() else {
            return false;
        };
        warn!(
            event_name = "resolver.session.invalidated",
            event_domain = "resolver",
            provider = session.provider.as_str(),
            "Session of '{}' invalidated",
            session.email
        );
        self.hub.publish(None);
        self.persist().await;
        true
    }

    /// Advisory cancellation: the in-flight call of `class` keeps running but
    /// its completion no longer changes any state.
    pub fn cancel(&self, class: OperationClass) -> bool {
        let cancelled = self.tracker.cancel(class);
        if cancelled {
            info!(
                event_name = "resolver.operation.cancelled",
                event_domain = "resolver",
                operation = class.as_str(),
                "Cancelled in-flight operation"
            );
        }
        cancelled
    }

    /// Loads the persisted session slot, if any. Only used at startup, before
    /// any operation has run.
    pub async fn restore(&self) -> Option<Session> {
        if !self.is_configured() {
            return None;
        }
        match self.store.load().await {
            Ok(Some(SessionSlot {
                is_authenticated: true,
                session: Some(session),
            })) => {
                if self.hub.current().is_none() {
                    info!(
                        event_name = "resolver.session.restored",
                        event_domain = "resolver",
                        store = self.store.get_name(),
                        "Restored session of '{}'",
                        session.email
                    );
                    self.hub.publish(Some(session.clone()));
                }
                Some(session)
            }
            Ok(_) => {
                debug!("No persisted session in store '{}'", self.store.get_name());
                None
            }
            Err(e) => {
                warn!(
                    "Failed to load persisted session from store '{}': {}",
                    self.store.get_name(),
                    e
                );
                None
            }
        }
    }

    // -- Internals

    fn ready(&self) -> Result<&Providers, AuthError> {
        match &self.readiness {
            Readiness::Ready(providers) => Ok(providers),
            Readiness::Unconfigured(reason) => Err(AuthError::NotConfigured(reason.clone())),
        }
    }

    /// Publishes a failure raised before any provider was contacted.
    fn refuse(&self, operation: OperationClass, error: AuthError) -> AuthError {
        self.hub.notify_failure(operation, error.clone());
        error
    }

    /// Cancels every in-flight call whose completion could establish or
    /// replace the session.
    fn supersede_session_writers(&self) {
        for class in SESSION_WRITERS {
            self.tracker.cancel(class);
        }
    }

    /// Records a terminal failure for a tracked call. A stale call records
    /// nothing and reports `Cancelled`.
    fn fail(&self, ticket: &Ticket, error: AuthError) -> AuthError {
        if error == AuthError::Cancelled {
            return error;
        }
        let recorded = ticket.fail(&error, || {
            self.hub.notify_failure(ticket.class(), error.clone())
        });
        if recorded {
            error
        } else {
            AuthError::Cancelled
        }
    }

    /// Publishes the session established by `ticket`. A session check that
    /// started earlier reflects older state, so it is superseded here.
    async fn commit(&self, ticket: &Ticket, session: Option<Session>) -> Result<(), AuthError> {
        let superseded = [OperationClass::GetCurrentSession];
        if !ticket.succeed_superseding(&superseded, || self.hub.publish(session)) {
            return Err(AuthError::Cancelled);
        }
        self.persist().await;
        Ok(())
    }

    /// Writes whatever the hub holds right now, so the last writer always
    /// persists the latest session.
    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let result = match self.hub.current() {
            Some(session) => self.store.save(&SessionSlot::from_session(Some(session))).await,
            None => self.store.clear().await,
        };
        if let Err(e) = result {
            warn!(
                event_name = "resolver.persist.failed",
                event_domain = "resolver",
                store = self.store.get_name(),
                "Failed to persist session: {}",
                e
            );
        }
    }

    /// Runs one provider call under the configured timeout and records it.
    async fn call_provider<T, F>(
        &self,
        operation: OperationClass,
        role: ProviderOrigin,
        provider_name: &str,
        call: F,
    ) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        let started = Instant::now();
        let result = match self.timeout {
            Some(limit) => match timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderFailure::network(format!(
                    "Provider '{}' timed out after {} ms",
                    provider_name,
                    limit.as_millis()
                ))),
            },
            None => call.await,
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(failure) => failure.kind.as_str(),
        };
        self.metrics
            .record_provider_attempt(operation.as_str(), role.as_str(), provider_name, outcome);
        self.metrics.record_provider_duration(
            operation.as_str(),
            role.as_str(),
            started.elapsed().as_secs_f64(),
        );
        debug!(
            event_name = "resolver.provider.call",
            event_domain = "resolver",
            operation = operation.as_str(),
            role = role.as_str(),
            provider = provider_name,
            outcome,
            "Provider call finished"
        );
        result
    }

    async fn attempt_primary<T, P>(
        &self,
        ticket: &Ticket,
        providers: &Providers,
        primary: P,
    ) -> Result<T, AuthError>
    where
        P: Future<Output = ProviderResult<T>>,
    {
        let name = providers.primary.get_name();
        match self
            .call_provider(ticket.class(), ProviderOrigin::Primary, name, primary)
            .await
        {
            Ok(value) => {
                ticket.advance(Step::PrimarySucceeded);
                Ok(value)
            }
            Err(failure) => {
                ticket.advance(Step::PrimaryFailed);
                Err(failure.into())
            }
        }
    }

    /// Primary first; on failure the legacy call, when one is given. Both
    /// failing surfaces the legacy error.
    async fn attempt<T, P, F, FF>(
        &self,
        ticket: &Ticket,
        providers: &Providers,
        primary: P,
        fallback: Option<(&str, F)>,
    ) -> Result<(T, ProviderOrigin), AuthError>
    where
        P: Future<Output = ProviderResult<T>>,
        F: FnOnce() -> FF,
        FF: Future<Output = ProviderResult<T>>,
    {
        let op = ticket.class();
        let primary_name = providers.primary.get_name();
        let failure = match self
            .call_provider(op, ProviderOrigin::Primary, primary_name, primary)
            .await
        {
            Ok(value) => {
                ticket.advance(Step::PrimarySucceeded);
                return Ok((value, ProviderOrigin::Primary));
            }
            Err(failure) => failure,
        };

        ticket.advance(Step::PrimaryFailed);
        let Some((fallback_name, call)) = fallback.filter(|_| ticket.fallback_defined()) else {
            return Err(failure.into());
        };
        if !ticket.is_current() {
            return Err(AuthError::Cancelled);
        }

        match self.fallback_log.should_emit(op.as_str()) {
            Some(suppressed) => warn!(
                event_name = "resolver.fallback",
                event_domain = "resolver",
                operation = op.as_str(),
                provider = primary_name,
                fallback = fallback_name,
                suppressed,
                "Primary provider failed, falling back to legacy provider: {}",
                failure
            ),
            None => debug!(
                operation = op.as_str(),
                "Primary provider failed, falling back: {}", failure
            ),
        }
        self.metrics.record_fallback(op.as_str());

        match self
            .call_provider(op, ProviderOrigin::Fallback, fallback_name, call())
            .await
        {
            Ok(value) => {
                ticket.advance(Step::FallbackSucceeded);
                Ok((value, ProviderOrigin::Fallback))
            }
            Err(failure) => {
                ticket.advance(Step::FallbackFailed);
                Err(failure.into())
            }
        }
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        started: Instant,
        result: Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        self.metrics.record_operation(operation, label);
        self.metrics
            .record_operation_duration(operation, label, started.elapsed().as_secs_f64());

        match &result {
            Ok(_) => debug!(
                event_name = "resolver.operation.completed",
                event_domain = "resolver",
                operation,
                "Operation completed"
            ),
            Err(AuthError::Cancelled) => debug!(
                event_name = "resolver.operation.superseded",
                event_domain = "resolver",
                operation,
                "Operation superseded, result discarded"
            ),
            Err(e) => info!(
                event_name = "resolver.operation.failed",
                event_domain = "resolver",
                operation,
                kind = e.kind(),
                "Operation failed: {}",
                e
            ),
        }
        result
    }
}

/// The identity behind the primary's session, or `None` when it holds none.
async fn lookup_primary_session(primary: &dyn PrimaryProvider) -> ProviderResult<Option<Identity>> {
    if !primary.get_session().await? {
        return Ok(None);
    }
    primary.get_current_user().await.map(Some)
}

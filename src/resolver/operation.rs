//! Per-class operation state machine and in-flight bookkeeping.
//!
//! Every auth action belongs to an [`OperationClass`]. Each class owns one
//! slot holding its [`OperationState`], a generation counter and the last
//! terminal error. Starting a new call bumps the generation, which turns any
//! older call of the same class stale: a stale call may still finish its
//! network round-trip but can no longer change state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    SignIn,
    SignUp,
    SignOut,
    ResetPassword,
    UpdatePassword,
    UpdateProfile,
    GetCurrentSession,
    OAuthSignIn,
}

impl OperationClass {
    pub const ALL: [OperationClass; 8] = [
        OperationClass::SignIn,
        OperationClass::SignUp,
        OperationClass::SignOut,
        OperationClass::ResetPassword,
        OperationClass::UpdatePassword,
        OperationClass::UpdateProfile,
        OperationClass::GetCurrentSession,
        OperationClass::OAuthSignIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::SignIn => "sign_in",
            OperationClass::SignUp => "sign_up",
            OperationClass::SignOut => "sign_out",
            OperationClass::ResetPassword => "reset_password",
            OperationClass::UpdatePassword => "update_password",
            OperationClass::UpdateProfile => "update_profile",
            OperationClass::GetCurrentSession => "get_current_session",
            OperationClass::OAuthSignIn => "oauth_sign_in",
        }
    }

    /// Whether a failed primary call is retried on the legacy provider.
    /// Sign-up only falls back when the platform mode allows it.
    pub fn has_fallback(&self, sign_up_fallback: bool) -> bool {
        match self {
            OperationClass::SignIn | OperationClass::ResetPassword => true,
            OperationClass::SignUp => sign_up_fallback,
            _ => false,
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "resolution", rename_all = "snake_case")]
pub enum OperationState {
    Idle,
    PrimaryInFlight,
    FallbackInFlight,
    Resolved(Resolution),
}

impl OperationState {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            OperationState::PrimaryInFlight | OperationState::FallbackInFlight
        )
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Invoke,
    PrimarySucceeded,
    PrimaryFailed,
    FallbackSucceeded,
    FallbackFailed,
    Settle,
    Cancel,
}

/// The transition table. Returns `None` for steps that are not legal in the
/// given state.
pub fn transition(state: OperationState, step: Step, fallback_defined: bool) -> Option<OperationState> {
    use OperationState::*;
    match (state, step) {
        (_, Step::Cancel) => Some(Idle),
        (Idle, Step::Invoke) => Some(PrimaryInFlight),
        (PrimaryInFlight, Step::PrimarySucceeded) => Some(Resolved(Resolution::Success)),
        (PrimaryInFlight, Step::PrimaryFailed) if fallback_defined => Some(FallbackInFlight),
        (PrimaryInFlight, Step::PrimaryFailed) => Some(Resolved(Resolution::Failure)),
        (FallbackInFlight, Step::FallbackSucceeded) => Some(Resolved(Resolution::Success)),
        (FallbackInFlight, Step::FallbackFailed) => Some(Resolved(Resolution::Failure)),
        (Resolved(_), Step::Settle) => Some(Idle),
        _ => None,
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    state: OperationState,
    last_error: Option<AuthError>,
}

impl Slot {
    fn cancel(&mut self) -> bool {
        let was_in_flight = self.state.is_in_flight();
        self.generation += 1;
        self.state = transition(self.state, Step::Cancel, false).unwrap_or(OperationState::Idle);
        was_in_flight
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            generation: 0,
            state: OperationState::Idle,
            last_error: None,
        }
    }
}

/// Observable state of one operation class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationStatus {
    pub operation: OperationClass,
    pub state: OperationState,
    pub loading: bool,
    pub error: Option<String>,
}

/// Tracks the in-flight state of every operation class.
#[derive(Debug, Default)]
pub struct OperationTracker {
    slots: Mutex<HashMap<OperationClass, Slot>>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<OperationClass, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a new call of `class`, superseding any call already in flight.
    pub fn begin(self: &Arc<Self>, class: OperationClass, fallback_defined: bool) -> Ticket {
        let mut slots = self.slots();
        let slot = slots.entry(class).or_default();
        slot.generation += 1;
        slot.last_error = None;
        slot.state = transition(OperationState::Idle, Step::Invoke, fallback_defined)
            .unwrap_or(OperationState::PrimaryInFlight);
        Ticket {
            tracker: Arc::clone(self),
            class,
            generation: slot.generation,
            fallback_defined,
        }
    }

    /// Advisory cancellation. The in-flight call keeps running but its
    /// completion is ignored. Returns true when something was in flight.
    pub fn cancel(&self, class: OperationClass) -> bool {
        self.slots().entry(class).or_default().cancel()
    }

    pub fn status(&self, class: OperationClass) -> OperationStatus {
        let slots = self.slots();
        let (state, error) = slots
            .get(&class)
            .map(|s| (s.state, s.last_error.as_ref().map(ToString::to_string)))
            .unwrap_or((OperationState::Idle, None));
        OperationStatus {
            operation: class,
            state,
            loading: state.is_in_flight(),
            error,
        }
    }

    pub fn is_loading(&self, class: OperationClass) -> bool {
        self.status(class).loading
    }
}

/// Scoped claim on an operation slot. Dropping the ticket settles the slot
/// back to idle, so the loading flag is cleared on every exit path.
#[derive(Debug)]
pub struct Ticket {
    tracker: Arc<OperationTracker>,
    class: OperationClass,
    generation: u64,
    fallback_defined: bool,
}

impl Ticket {
    pub fn class(&self) -> OperationClass {
        self.class
    }

    pub fn fallback_defined(&self) -> bool {
        self.fallback_defined
    }

    pub fn is_current(&self) -> bool {
        self.tracker
            .slots()
            .get(&self.class)
            .map_or(false, |s| s.generation == self.generation)
    }

    /// Applies `step` if this ticket is still current. Returns false when the
    /// call has been superseded or cancelled.
    pub fn advance(&self, step: Step) -> bool {
        let mut slots = self.tracker.slots();
        match slots.get_mut(&self.class) {
            Some(slot) if slot.generation == self.generation => {
                if let Some(next) = transition(slot.state, step, self.fallback_defined) {
                    slot.state = next;
                }
                true
            }
            _ => false,
        }
    }

    /// Records a terminal failure and runs `publish` atomically with the
    /// currency check. Nothing happens for a stale ticket.
    pub fn fail<F: FnOnce()>(&self, error: &AuthError, publish: F) -> bool {
        let mut slots = self.tracker.slots();
        match slots.get_mut(&self.class) {
            Some(slot) if slot.generation == self.generation => {
                slot.last_error = Some(error.clone());
                slot.state = OperationState::Resolved(Resolution::Failure);
                publish();
                true
            }
            _ => false,
        }
    }

    /// Runs `commit` while holding the slot lock, only if this ticket is
    /// still current, and marks the call resolved successfully.
    pub fn succeed<F: FnOnce()>(&self, commit: F) -> bool {
        self.succeed_superseding(&[], commit)
    }

    /// Like [`Ticket::succeed`], but also cancels the in-flight calls of
    /// `others` under the same lock, so none of them can commit over the
    /// state written here.
    pub fn succeed_superseding<F: FnOnce()>(&self, others: &[OperationClass], commit: F) -> bool {
        let mut slots = self.tracker.slots();
        match slots.get_mut(&self.class) {
            Some(slot) if slot.generation == self.generation => {
                slot.state = OperationState::Resolved(Resolution::Success);
            }
            _ => return false,
        }
        for class in others.iter().filter(|c| **c != self.class) {
            slots.entry(*class).or_default().cancel();
        }
        commit();
        true
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut slots = self.tracker.slots();
        if let Some(slot) = slots.get_mut(&self.class) {
            if slot.generation == self.generation {
                slot.state = transition(slot.state, Step::Settle, self.fallback_defined)
                    .unwrap_or(OperationState::Idle);
            }
        }
    }
}

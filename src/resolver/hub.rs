//! Single-writer container for the current session.
//!
//! Route guards read the current value through a `watch` channel; UI-like
//! consumers subscribe to the `broadcast` stream of [`AuthEvent`]s.

use tokio::sync::{broadcast, watch};
use tracing::trace;

use super::error::AuthError;
use super::operation::OperationClass;
use crate::models::Session;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SessionChanged(Option<Session>),
    Failed {
        operation: OperationClass,
        error: AuthError,
    },
}

#[derive(Debug)]
pub struct SessionHub {
    current: watch::Sender<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        SessionHub { current, events }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Replaces the current session and notifies subscribers once.
    pub(crate) fn publish(&self, session: Option<Session>) {
        self.current.send_replace(session.clone());
        // No receivers is fine; the watch value is still updated.
        let receivers = self.events.send(AuthEvent::SessionChanged(session)).unwrap_or(0);
        trace!(receivers, "published session change");
    }

    pub(crate) fn notify_failure(&self, operation: OperationClass, error: AuthError) {
        let _ = self.events.send(AuthEvent::Failed { operation, error });
    }
}

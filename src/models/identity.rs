use serde::{Deserialize, Serialize};

use super::session::Session;

/// A user identity as reported by a provider, before it becomes a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Fields a caller wants to change on the current profile.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar_url.is_none()
    }
}

/// Profile fields echoed back by the provider after an update.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Registration form as submitted by the user.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    #[serde(default)]
    pub referral: Option<String>,
}

/// What the primary provider reports after a successful sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpReceipt {
    pub identity: Identity,
    /// False when the provider requires email confirmation first.
    pub session_established: bool,
}

/// Account payload understood by the legacy provider's registration endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LegacyAccount {
    pub name: String,
    pub email: String,
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
}

impl From<&SignUpRequest> for LegacyAccount {
    fn from(request: &SignUpRequest) -> Self {
        LegacyAccount {
            name: request.name.clone(),
            email: request.email.clone(),
            credential: request.password.clone(),
            referral: request.referral.clone().filter(|r| !r.is_empty()),
        }
    }
}

/// Terminal outcome of a successful sign-up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignUpOutcome {
    /// The account exists but the user must confirm their email first.
    PendingVerification { email: String },
    /// The account is usable right away and is now the current session.
    Established { session: Session },
}

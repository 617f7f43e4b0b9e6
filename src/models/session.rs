use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::identity::{Identity, ProfileFields};

/// Which identity provider produced a session.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOrigin {
    Primary,
    Fallback,
}

impl ProviderOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOrigin::Primary => "primary",
            ProviderOrigin::Fallback => "fallback",
        }
    }
}

/// The authenticated identity currently recognised by the application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub provider: ProviderOrigin,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from a provider identity. The display name falls back
    /// to the email when the provider did not return one.
    pub fn from_identity(identity: Identity, provider: ProviderOrigin) -> Self {
        let name = identity
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| identity.email.clone());
        Session {
            id: identity.id,
            email: identity.email,
            name,
            avatar_url: identity.avatar_url,
            provider,
            issued_at: Utc::now(),
        }
    }

    /// Shallow merge of server-returned profile fields. Present fields win.
    pub fn merge_profile(&mut self, fields: ProfileFields) {
        if let Some(email) = fields.email {
            self.email = email;
        }
        if let Some(name) = fields.name {
            self.name = name;
        }
        if let Some(avatar_url) = fields.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
    }
}

/// Result of a session check. Absence of a session is a normal outcome.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "session", rename_all = "snake_case")]
pub enum SessionCheck {
    Active(Session),
    NoSession,
}

impl SessionCheck {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionCheck::Active(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: Option<&str>) -> Identity {
        Identity {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            name: name.map(str::to_string),
            avatar_url: None,
        }
    }

    #[test]
    fn test_name_defaults_to_email() {
        let session = Session::from_identity(identity(None), ProviderOrigin::Fallback);
        assert_eq!(session.name, "a@b.com");
        assert_eq!(session.provider, ProviderOrigin::Fallback);

        let blank = Session::from_identity(identity(Some("  ")), ProviderOrigin::Primary);
        assert_eq!(blank.name, "a@b.com");
    }

    #[test]
    fn test_merge_profile_server_fields_win() {
        let mut session = Session::from_identity(identity(Some("Ana")), ProviderOrigin::Primary);
        session.avatar_url = Some("old.png".to_string());

        session.merge_profile(ProfileFields {
            email: None,
            name: Some("Ana Maria".to_string()),
            avatar_url: Some("new.png".to_string()),
        });

        assert_eq!(session.name, "Ana Maria");
        assert_eq!(session.email, "a@b.com");
        assert_eq!(session.avatar_url.as_deref(), Some("new.png"));
    }

    #[test]
    fn test_session_check_serialization() {
        let json = serde_json::to_value(SessionCheck::NoSession).unwrap();
        assert_eq!(json["status"], "no_session");
    }
}

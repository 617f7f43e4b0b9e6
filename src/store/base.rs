use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    file_store::{FileStore, FileStoreConfig},
    memory_store::MemoryStore,
};
use crate::models::Session;

/// Key of the single slot holding the current session.
pub const CURRENT_SESSION_KEY: &str = "current_session";

/// What survives a restart. Route guards only look at `isAuthenticated`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSlot {
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
    pub session: Option<Session>,
}

impl SessionSlot {
    pub fn from_session(session: Option<Session>) -> Self {
        SessionSlot {
            is_authenticated: session.is_some(),
            session,
        }
    }
}

/// The SessionStore trait abstracts the persisted "current session" slot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn get_name(&self) -> &str;
    async fn load(&self) -> Result<Option<SessionSlot>, String>;
    async fn save(&self, slot: &SessionSlot) -> Result<(), String>;
    async fn clear(&self) -> Result<(), String>;
}

/// The existing store backends, selected by a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone, Default)]
#[serde(tag = "type")]
pub enum SessionStoreConfig {
    #[default]
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

/// Creates a concrete store implementation based on the config.
pub fn create_store(config: &SessionStoreConfig) -> Arc<dyn SessionStore> {
    match config {
        SessionStoreConfig::Memory => {
            info!("Session store: in-memory (sessions are lost on restart)");
            Arc::new(MemoryStore::new())
        }
        SessionStoreConfig::File(cfg) => {
            info!("Session store: file at '{}'", cfg.path.display());
            Arc::new(FileStore::new(cfg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_flag_uses_camel_case() {
        let json = serde_json::to_value(SessionSlot::from_session(None)).unwrap();
        assert_eq!(json["isAuthenticated"], false);
        assert!(json["session"].is_null());
    }
}

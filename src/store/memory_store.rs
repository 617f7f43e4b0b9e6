use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::base::{SessionSlot, SessionStore, CURRENT_SESSION_KEY};

/// Keeps the session slot in process memory.
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, SessionSlot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn get_name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Option<SessionSlot>, String> {
        Ok(self.slots.read().await.get(CURRENT_SESSION_KEY).cloned())
    }

    async fn save(&self, slot: &SessionSlot) -> Result<(), String> {
        self.slots
            .write()
            .await
            .insert(CURRENT_SESSION_KEY.to_string(), slot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        self.slots.write().await.remove(CURRENT_SESSION_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_save_load_clear() {
        let store = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let slot = SessionSlot {
            is_authenticated: false,
            session: None,
        };
        store.save(&slot).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(slot));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}

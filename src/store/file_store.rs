use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::base::{SessionSlot, SessionStore, CURRENT_SESSION_KEY};

#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct FileStoreConfig {
    pub path: PathBuf,
}

/// Persists slots as a JSON object in a single file, keyed by slot name.
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(config: &FileStoreConfig) -> Self {
        Self {
            path: config.path.clone(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<HashMap<String, SessionSlot>, String> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => Ok(map),
                Err(e) => {
                    // A corrupt file is treated as "no session" rather than a hard error.
                    warn!("Ignoring unreadable session file '{}': {}", self.path.display(), e);
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(format!("Failed to read '{}': {}", self.path.display(), e)),
        }
    }

    async fn write_all(&self, slots: &HashMap<String, SessionSlot>) -> Result<(), String> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
        }
        let bytes = serde_json::to_vec_pretty(slots)
            .map_err(|e| format!("Failed to serialize session slots: {}", e))?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| format!("Failed to write '{}': {}", self.path.display(), e))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    fn get_name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<Option<SessionSlot>, String> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(CURRENT_SESSION_KEY))
    }

    async fn save(&self, slot: &SessionSlot) -> Result<(), String> {
        let _guard = self.lock.lock().await;
        let mut slots = self.read_all().await?;
        slots.insert(CURRENT_SESSION_KEY.to_string(), slot.clone());
        debug!("Writing session slot to '{}'", self.path.display());
        self.write_all(&slots).await
    }

    async fn clear(&self) -> Result<(), String> {
        let _guard = self.lock.lock().await;
        let mut slots = self.read_all().await?;
        if slots.remove(CURRENT_SESSION_KEY).is_some() {
            self.write_all(&slots).await?;
        }
        Ok(())
    }
}

//! Local state file
//!
//! `.tcflow/state.json` records, per managed resource, the provider-assigned
//! id and the attributes last read back after convergence. Only the commit
//! helpers in [`crate::provider`] write entries.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".tcflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Locks older than this are considered abandoned
const STALE_LOCK_HOURS: i64 = 1;

/// All managed resources of one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    /// Resources indexed by `type:name`
    pub resources: HashMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: HashMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resource(&mut self, key: String, state: ResourceState) {
        self.resources.insert(key, state);
        self.updated_at = Utc::now();
    }

    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let removed = self.resources.remove(key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    /// Entries of one resource type
    pub fn by_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = (&'a String, &'a ResourceState)> {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }
}

/// Committed state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-assigned id, composite ids included
    pub id: String,

    pub resource_type: String,

    pub attributes: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Replace all attributes with a fresh read-back
    pub fn replace_attributes(&mut self, attributes: HashMap<String, serde_json::Value>) {
        self.attributes = attributes;
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Reads and writes the state file of one project
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.path(STATE_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no state file yet, starting empty");
                return Ok(GlobalState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: GlobalState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "state file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(resources = state.resources.len(), "loaded state");
        Ok(state)
    }

    /// Write the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path(STATE_FILE);
        if fs::try_exists(&path).await? {
            fs::copy(&path, self.path(STATE_BACKUP)).await?;
        }

        let tmp = self.path("state.json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(resources = state.resources.len(), "saved state");
        Ok(())
    }

    /// Take the project lock; a lock older than one hour is taken over
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let lock_path = self.path(LOCK_FILE);

        if let Ok(content) = fs::read_to_string(&lock_path).await {
            let held: LockInfo = serde_json::from_str(&content)?;
            let age = Utc::now().signed_duration_since(held.acquired_at);
            if age.num_hours() < STALE_LOCK_HOURS {
                return Err(CloudError::LockError(format!(
                    "state is locked by {} since {}",
                    held.holder, held.acquired_at
                )));
            }
            tracing::warn!(holder = %held.holder, "taking over stale state lock");
        }

        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };
        fs::write(&lock_path, serde_json::to_string_pretty(&info)?).await?;

        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// Held project lock; removed on release or drop
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            match fs::remove_file(&self.lock_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = StateManager::new(dir.path());

        let mut state = GlobalState::new();
        state.set_resource(
            "elasticsearch_index:logs".to_string(),
            ResourceState::new("es-abc#_doc#logs", "elasticsearch_index")
                .with_attribute("index_name", serde_json::json!("logs")),
        );
        manager.save(&state).await.unwrap();
        // second save produces a backup
        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        let entry = loaded.get_resource("elasticsearch_index:logs").unwrap();
        assert_eq!(entry.id, "es-abc#_doc#logs");
        assert_eq!(entry.get_attribute::<String>("index_name").as_deref(), Some("logs"));
        assert!(dir.path().join(".tcflow/state.json.backup").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = tempdir().unwrap();
        let state = StateManager::new(dir.path()).load().await.unwrap();
        assert!(state.resources.is_empty());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let manager = StateManager::new(dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));

        lock.release().await.unwrap();
        manager.acquire_lock().await.unwrap();
    }
}

//! Persistent key→string storage collaborators.
//!
//! The cache layer only ever sees [`KvStore`]. `MemoryKvStore` backs tests
//! and ephemeral sessions; `FileKvStore` is the durable default, one JSON
//! document on disk replaced atomically per write.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl KvError {
    pub fn from_storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;

    async fn remove(&self, key: &str) -> Result<(), KvError>;
}

/// Volatile store; contents live as long as the process.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let mut guard = self.entries.write().await;
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut guard = self.entries.write().await;
        guard.remove(key);
        Ok(())
    }
}

/// Durable store over a single JSON file. Writes serialize the whole map and
/// replace the file through a temp-file rename, so a crash mid-write leaves
/// the previous generation intact.
pub struct FileKvStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileKvStore {
    /// Opens (or creates) the backing file. An unreadable file starts the
    /// store empty rather than failing the caller: losing a cache beats
    /// refusing to boot.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(KvError::from_storage)?;
        }
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "kv file unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(KvError::from_storage(err)),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn write_file(&self, raw: String) -> Result<(), KvError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let parent = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let mut file =
                tempfile::NamedTempFile::new_in(parent).map_err(KvError::from_storage)?;
            file.write_all(raw.as_bytes())
                .map_err(KvError::from_storage)?;
            file.persist(&path).map_err(KvError::from_storage)?;
            Ok(())
        })
        .await
        .map_err(KvError::from_storage)?
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let guard = self.entries.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        // The write guard is held through the file replace so generations
        // reach the disk in insertion order.
        let mut guard = self.entries.write().await;
        guard.insert(key.to_string(), value);
        let raw = serde_json::to_string(&*guard).map_err(KvError::from_storage)?;
        self.write_file(raw).await
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut guard = self.entries.write().await;
        if guard.remove(key).is_none() {
            return Ok(());
        }
        let raw = serde_json::to_string(&*guard).map_err(KvError::from_storage)?;
        self.write_file(raw).await
    }
}

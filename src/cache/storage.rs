use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::strategy::matches_pattern;
use crate::infrastructure::error::{CacheError, Result};

/// Shared tier-2 key/value store.
///
/// Keys are full namespaced keys; `pattern` in [`RemoteStore::keys`] supports
/// `*` wildcards. Failures are reported as [`CacheError::Remote`] and absorbed
/// by the cache manager.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value`, expiring it after `ttl` when given
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |deadline| now >= deadline)
    }
}

/// Process-local tier-2 store, for single-node deployments and tests
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|value| !value.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .map_or(false, |value| !value.is_expired(now))
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(value) if value.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(value) => Ok(Some(value.data.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.filter(|ttl| !ttl.is_zero()).map(|ttl| Instant::now() + ttl);
        self.entries.write().await.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, value| !value.is_expired(now));
        Ok(entries
            .keys()
            .filter(|key| matches_pattern(key, pattern))
            .cloned()
            .collect())
    }
}

/// Per-key metadata persisted next to the data files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntryMetadata {
    file_name: String,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    data_size: usize,
    checksum: String,
}

impl FileEntryMetadata {
    fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |expires_at| Utc::now() >= expires_at)
    }
}

/// Tier-2 store backed by a directory: one data file per key plus a JSON
/// index, so cached data survives process restarts.
#[derive(Debug)]
pub struct FileRemoteStore {
    dir: PathBuf,
    index: Mutex<HashMap<String, FileEntryMetadata>>,
}

impl FileRemoteStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::remote("open", e.to_string()))?;

        let index_path = dir.join(INDEX_FILE);
        let index = if fs::try_exists(&index_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&index_path)
                .await
                .map_err(|e| CacheError::remote("open", e.to_string()))?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %index_path.display(), error = %e, "unreadable store index, starting empty");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    async fn save_index(&self, index: &HashMap<String, FileEntryMetadata>) -> Result<()> {
        let content = serde_json::to_string_pretty(index)?;
        fs::write(self.dir.join(INDEX_FILE), content)
            .await
            .map_err(|e| CacheError::remote("save_index", e.to_string()))
    }

    async fn remove_locked(
        &self,
        index: &mut HashMap<String, FileEntryMetadata>,
        key: &str,
    ) -> Result<bool> {
        let Some(metadata) = index.remove(key) else {
            return Ok(false);
        };
        let path = self.data_path(&metadata.file_name);
        if let Err(e) = fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %e, "data file already gone");
        }
        Ok(true)
    }
}

const INDEX_FILE: &str = "index.json";

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl RemoteStore for FileRemoteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut index = self.index.lock().await;
        let Some(metadata) = index.get(key).cloned() else {
            return Ok(None);
        };

        if metadata.is_expired() {
            self.remove_locked(&mut index, key).await?;
            self.save_index(&index).await?;
            return Ok(None);
        }

        match fs::read(self.data_path(&metadata.file_name)).await {
            Ok(data) if checksum(&data) == metadata.checksum => Ok(Some(data)),
            Ok(_) | Err(_) => {
                warn!(key = %key, "corrupted or missing data file, dropping entry");
                self.remove_locked(&mut index, key).await?;
                self.save_index(&index).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let created_at = Utc::now();
        let expires_at = match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => Some(
                created_at
                    + chrono::Duration::from_std(ttl)
                        .map_err(|e| CacheError::remote("set", e.to_string()))?,
            ),
            None => None,
        };

        let digest = checksum(&value);
        // file names derive from the key, never from user-controlled path characters
        let file_name = format!("{}.cache", checksum(key.as_bytes()));
        fs::write(self.data_path(&file_name), &value)
            .await
            .map_err(|e| CacheError::remote("set", e.to_string()))?;

        let mut index = self.index.lock().await;
        index.insert(
            key.to_string(),
            FileEntryMetadata {
                file_name,
                created_at,
                expires_at,
                data_size: value.len(),
                checksum: digest,
            },
        );
        self.save_index(&index).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut index = self.index.lock().await;
        if self.remove_locked(&mut index, key).await? {
            self.save_index(&index).await?;
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let index = self.index.lock().await;
        Ok(index
            .iter()
            .filter(|(key, metadata)| !metadata.is_expired() && matches_pattern(key, pattern))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

//! Key-value store kept in memory and optionally snapshotted to a JSON file.
//!
//! Every mutation rewrites the snapshot atomically (temp file in the same
//! directory, then rename) before it becomes visible; a failed write leaves
//! the store unchanged.

use crate::client::{KvApi, KvEntry};
use crate::error::RemoteError;
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
    snapshot: Option<PathBuf>,
}

impl MemoryKv {
    /// Store that lives only as long as the process.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            snapshot: None,
        }
    }

    /// Store backed by the JSON file at `path`, loaded when it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RemoteError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Opened key-value store {} ({} keys)", path.display(), entries.len());
        Ok(Self {
            entries: RwLock::new(entries),
            snapshot: Some(path),
        })
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), RemoteError> {
        let Some(path) = self.snapshot.clone() else {
            return Ok(());
        };
        let content = serde_json::to_vec_pretty(entries)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &content))
            .await
            .map_err(|e| RemoteError::Io(format!("Snapshot task panicked: {e}")))?
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), RemoteError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.persist(path).map_err(|e| RemoteError::from(e.error))?;
    debug!("Snapshot written to {}", path.display());
    Ok(())
}

/// Match `key` against a pattern where `*` stands for any run of characters.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let source = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{source}$"))
        .map(|re| re.is_match(key))
        .unwrap_or(false)
}

#[async_trait]
impl KvApi for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool, RemoteError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, RemoteError> {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }

    async fn list(&self, pattern: &str, return_values: bool) -> Result<Vec<KvEntry>, RemoteError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, value)| KvEntry {
                key: key.clone(),
                value: return_values.then(|| value.clone()),
            })
            .collect())
    }

    async fn flush(&self) -> Result<bool, RemoteError> {
        let mut entries = self.entries.write().await;
        let next = BTreeMap::new();
        self.persist(&next).await?;
        *entries = next;
        Ok(true)
    }
}

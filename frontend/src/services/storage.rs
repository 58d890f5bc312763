//! # Client Storage
//!
//! Small persistent key-value store standing in for browser local storage.
//! Values are strings; the whole map is written back to a JSON file on every
//! mutation. A store without a path lives in memory only.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct ClientStorage {
    path: Option<PathBuf>,
    values: Mutex<BTreeMap<String, String>>,
}

impl ClientStorage {
    /// Open (or create) the store backed by `path`.
    ///
    /// A file that cannot be parsed is treated as empty and replaced on the
    /// next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(values) => values,
                Err(e) => {
                    warn!("Client storage at {:?} is corrupt, starting empty: {}", path, e);
                    BTreeMap::new()
                }
            }
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        debug!("Opened client storage at {:?} with {} keys", path, values.len());
        Ok(Self {
            path: Some(path),
            values: Mutex::new(values),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.into());
        self.persist(&values)
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock();
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(values)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");

        let storage = ClientStorage::open(&path).unwrap();
        storage.set("token", "abc").unwrap();
        drop(storage);

        let reopened = ClientStorage::open(&path).unwrap();
        assert_eq!(reopened.get("token").as_deref(), Some("abc"));
    }

    #[test]
    fn test_remove_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = ClientStorage::open(&path).unwrap();
        storage.set("token", "abc").unwrap();
        storage.remove("token").unwrap();

        let reopened = ClientStorage::open(&path).unwrap();
        assert!(reopened.get("token").is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        let storage = ClientStorage::open(&path).unwrap();
        assert!(storage.get("user").is_none());
        storage.set("user", "{}").unwrap();
    }
}

//! Local Persistence
//!
//! Key-namespaced JSON blobs on disk. Every store in the application
//! (alerts, DCA strategies, credentials, order history) sits on top of
//! [`JsonStore`]. Readers tolerate missing or malformed blobs by falling
//! back to a default value, so a corrupted file degrades to empty state
//! instead of taking the engine down.

pub mod alert_store;
pub mod dca_store;
pub mod order_history;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Error type for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] crate::domain::errors::ValidationError),
}

/// File-backed key-value store. One JSON file per key.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Read the value stored under `key`. Missing or malformed data
    /// yields `T::default()`.
    pub fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return T::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("malformed blob under key '{}', using defaults: {}", key, e);
                T::default()
            }
        }
    }

    /// Write `value` under `key` atomically (temp file + rename).
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(value)?;
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    /// Remove the blob under `key`, if any.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Blob {
        count: u32,
        label: String,
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let blob = Blob {
            count: 3,
            label: "hello".to_string(),
        };
        store.write("blob", &blob).unwrap();
        let back: Blob = store.read("blob");
        assert_eq!(back, blob);
    }

    #[test]
    fn test_missing_key_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let blob: Blob = store.read("nope");
        assert_eq!(blob, Blob::default());
    }

    #[test]
    fn test_malformed_blob_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let blob: Blob = store.read("broken");
        assert_eq!(blob, Blob::default());
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        store.write("gone", &Blob::default()).unwrap();
        store.remove("gone").unwrap();
        assert!(!dir.path().join("gone.json").exists());
        // removing again is a no-op
        store.remove("gone").unwrap();
    }
}

//! Credential storage
//!
//! API key material lives only in the local device store and in memory,
//! wrapped so it is zeroed on drop. The secret is never logged and never
//! leaves the process except as the basis for a per-request signature.

use crate::persistence::{JsonStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

const CREDENTIALS_KEY: &str = "credentials";

/// Locally stored exchange API credentials.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredKeys {
    pub api_key: String,
    pub api_secret: String,
}

// Redact both fields; the key id alone is enough to correlate logs.
impl std::fmt::Debug for StoredKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKeys")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Store for the single credential record.
pub struct CredentialStore {
    store: Arc<JsonStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }

    /// Load the stored keys, if any. Malformed data reads as absent.
    pub fn load(&self) -> Option<StoredKeys> {
        let keys: Option<StoredKeys> = self.store.read(CREDENTIALS_KEY);
        keys.filter(|k| !k.api_key.is_empty() && !k.api_secret.is_empty())
    }

    pub fn has_keys(&self) -> bool {
        self.load().is_some()
    }

    pub fn save(&self, keys: &StoredKeys) -> Result<(), StoreError> {
        self.store.write(CREDENTIALS_KEY, keys)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(CREDENTIALS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_store() -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());
        (dir, CredentialStore::new(store))
    }

    #[test]
    fn test_absent_by_default() {
        let (_dir, creds) = credential_store();
        assert!(!creds.has_keys());
        assert!(creds.load().is_none());
    }

    #[test]
    fn test_save_load_clear() {
        let (_dir, creds) = credential_store();
        creds
            .save(&StoredKeys {
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            })
            .unwrap();
        assert!(creds.has_keys());
        let keys = creds.load().unwrap();
        assert_eq!(keys.api_key, "key");

        creds.clear().unwrap();
        assert!(!creds.has_keys());
    }

    #[test]
    fn test_empty_keys_read_as_absent() {
        let (_dir, creds) = credential_store();
        creds
            .save(&StoredKeys {
                api_key: String::new(),
                api_secret: String::new(),
            })
            .unwrap();
        assert!(!creds.has_keys());
    }

    #[test]
    fn test_debug_redacts() {
        let keys = StoredKeys {
            api_key: "visible-key".to_string(),
            api_secret: "visible-secret".to_string(),
        };
        let debug = format!("{:?}", keys);
        assert!(!debug.contains("visible-key"));
        assert!(!debug.contains("visible-secret"));
    }
}

//! Typed adapter over a storage backend
//!
//! Records are stored as UTF-8 strings; objects go through `serde_json`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{AccessPolicy, LoadOptions, SecureStorage};
use crate::error::{Result, WalletError};

#[derive(Clone)]
pub struct SecretStore {
    backend: Arc<dyn SecureStorage>,
}

impl SecretStore {
    pub fn new(backend: Arc<dyn SecureStorage>) -> Self {
        debug!("Secret store using {}", backend.backend_name());
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn is_hardware_backed(&self) -> bool {
        self.backend.is_hardware_backed()
    }

    pub async fn save_string(&self, key: &str, value: &str, policy: AccessPolicy) -> Result<()> {
        self.backend.store(key, value.as_bytes(), policy).await
    }

    pub async fn load_string(&self, key: &str, options: &LoadOptions) -> Result<Option<String>> {
        match self.backend.retrieve(key, options).await? {
            Some(bytes) => String::from_utf8(bytes).map(Some).map_err(|e| {
                WalletError::StoreUnavailable(format!("Entry {} is not UTF-8: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    pub async fn save_object<T: Serialize>(&self, key: &str, value: &T, policy: AccessPolicy) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.save_string(key, &json, policy).await
    }

    /// A record that exists but does not parse is reported as absent
    pub async fn load_object<T: DeserializeOwned>(&self, key: &str, options: &LoadOptions) -> Result<Option<T>> {
        let Some(json) = self.load_string(key, options).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Discarding unreadable record {}: {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn has_key(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BiometricStrength, MemoryStorage};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        version: f64,
        id: String,
    }

    #[tokio::test]
    async fn test_object_round_trip() {
        let store = SecretStore::new(Arc::new(MemoryStorage::new()));
        assert_eq!(store.backend_name(), "Memory Storage");
        assert!(!store.is_hardware_backed());
        let record = Record {
            version: 1.0,
            id: "wallet_1".to_string(),
        };
        store
            .save_object("r", &record, AccessPolicy::AlwaysThisDeviceOnly)
            .await
            .unwrap();

        let loaded: Option<Record> = store.load_object("r", &LoadOptions::default()).await.unwrap();
        assert_eq!(loaded, Some(record));

        let missing: Option<Record> = store.load_object("x", &LoadOptions::default()).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_insufficient_auth_is_not_absent() {
        let backend = Arc::new(MemoryStorage::new());
        let store = SecretStore::new(backend.clone());
        store
            .save_string("k", "secret", AccessPolicy::UserPresence { biometric: true })
            .await
            .unwrap();
        backend.set_biometric_strength(BiometricStrength::Weak).await;

        let result = store.load_string("k", &LoadOptions::default()).await;
        assert!(matches!(result, Err(WalletError::InsufficientAuth)));
        assert!(store.has_key("k").await.unwrap());

        store.remove("k").await.unwrap();
        assert!(store.load_string("k", &LoadOptions::default()).await.unwrap().is_none());
    }
}

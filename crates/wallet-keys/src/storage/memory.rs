//! In-process storage backend
//!
//! Models the access control of a mobile keychain: entries written with a
//! biometric `UserPresence` policy can only be read back while the device's
//! biometric factor is strong enough.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AccessPolicy, LoadOptions, SecureStorage};
use crate::error::{Result, WalletError};

/// Class of the enrolled biometric sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiometricStrength {
    #[default]
    Strong,
    /// e.g. 2D face unlock, rejected for biometric-gated entries
    Weak,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    policy: AccessPolicy,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    biometric: BiometricStrength,
    available: bool,
    #[cfg(test)]
    writes: Vec<String>,
}

#[derive(Debug)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                available: true,
                ..State::default()
            }),
        }
    }

    pub async fn set_biometric_strength(&self, strength: BiometricStrength) {
        self.state.write().await.biometric = strength;
    }

    /// Simulate the keychain becoming inaccessible
    pub async fn set_available(&self, available: bool) {
        self.state.write().await.available = available;
    }

    /// Keys in the order they were written
    #[cfg(test)]
    pub async fn write_log(&self) -> Vec<String> {
        self.state.read().await.writes.clone()
    }

    pub async fn policy_of(&self, key: &str) -> Option<AccessPolicy> {
        self.state.read().await.entries.get(key).map(|e| e.policy)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(state: &State) -> Result<()> {
        if state.available {
            Ok(())
        } else {
            Err(WalletError::StoreUnavailable("Memory store disabled".to_string()))
        }
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn store(&self, key: &str, value: &[u8], policy: AccessPolicy) -> Result<()> {
        let mut state = self.state.write().await;
        Self::check_available(&state)?;
        state.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                policy,
            },
        );
        #[cfg(test)]
        state.writes.push(key.to_string());
        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str, _options: &LoadOptions) -> Result<Option<Vec<u8>>> {
        let state = self.state.read().await;
        Self::check_available(&state)?;
        match state.entries.get(key) {
            Some(entry) => {
                let gated = matches!(entry.policy, AccessPolicy::UserPresence { biometric: true });
                if gated && state.biometric == BiometricStrength::Weak {
                    return Err(WalletError::InsufficientAuth);
                }
                Ok(Some(entry.value.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        Self::check_available(&state)?;
        if state.entries.remove(key).is_some() {
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let state = self.state.read().await;
        Self::check_available(&state)?;
        Ok(state.entries.contains_key(key))
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "Memory Storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE: AccessPolicy = AccessPolicy::UserPresence { biometric: true };

    #[tokio::test]
    async fn test_store_retrieve_delete() {
        let storage = MemoryStorage::new();
        let opts = LoadOptions::default();

        assert_eq!(storage.retrieve("k", &opts).await.unwrap(), None);
        storage.store("k", b"v", PRIVATE).await.unwrap();
        assert!(storage.exists("k").await.unwrap());
        assert_eq!(storage.retrieve("k", &opts).await.unwrap(), Some(b"v".to_vec()));

        storage.delete("k").await.unwrap();
        storage.delete("k").await.unwrap();
        assert!(!storage.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_weak_biometrics_gate_private_entries_only() {
        let storage = MemoryStorage::new();
        let opts = LoadOptions::prompt("Please authenticate");
        storage.store("private", b"secret", PRIVATE).await.unwrap();
        storage
            .store("public", b"0xabc", AccessPolicy::AlwaysThisDeviceOnly)
            .await
            .unwrap();
        storage.set_biometric_strength(BiometricStrength::Weak).await;

        assert!(matches!(
            storage.retrieve("private", &opts).await,
            Err(WalletError::InsufficientAuth)
        ));
        assert!(storage.exists("private").await.unwrap());
        assert_eq!(storage.retrieve("public", &opts).await.unwrap(), Some(b"0xabc".to_vec()));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let storage = MemoryStorage::new();
        storage.set_available(false).await;
        assert!(matches!(
            storage.exists("k").await,
            Err(WalletError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_write_log_keeps_order_and_repeats() {
        let storage = MemoryStorage::new();
        storage.store("b", b"1", PRIVATE).await.unwrap();
        storage.store("a", b"2", PRIVATE).await.unwrap();
        storage.store("b", b"3", PRIVATE).await.unwrap();
        storage.delete("a").await.unwrap();

        assert_eq!(storage.write_log().await, vec!["b", "a", "b"]);
        assert_eq!(storage.len().await, 1);
    }
}

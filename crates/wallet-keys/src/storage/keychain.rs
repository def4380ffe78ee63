//! OS Keychain storage backend
//!
//! Uses the system keychain for secure storage:
//! - macOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//!
//! Desktop keychains have no per-entry biometric gating, so the access policy
//! is only recorded in the debug log. The OS login session is the gate.

use async_trait::async_trait;
use base64::Engine;
use keyring::Entry;
use tracing::{debug, warn};

use super::{AccessPolicy, LoadOptions, SecureStorage};
use crate::error::{Result, WalletError};

const SERVICE_NAME: &str = "wallet-keys";

pub struct KeychainStorage {
    /// Namespace prepended to every key
    prefix: String,
    available: bool,
}

impl KeychainStorage {
    pub fn new(prefix: Option<&str>) -> Self {
        let prefix = prefix.map(|p| format!("{}-", p)).unwrap_or_default();
        let available = Self::probe();

        if available {
            debug!("Keychain storage is available");
        } else {
            warn!("Keychain storage is not available");
        }

        Self { prefix, available }
    }

    fn probe() -> bool {
        match Entry::new(SERVICE_NAME, "__probe__") {
            Ok(entry) => {
                let writable = entry.set_password("probe").is_ok();
                if writable {
                    let _ = entry.delete_password();
                }
                writable
            }
            Err(_) => false,
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        if !self.available {
            return Err(WalletError::StoreUnavailable("Keychain not available".to_string()));
        }
        Entry::new(SERVICE_NAME, &format!("{}{}", self.prefix, key))
            .map_err(|e| WalletError::StoreUnavailable(e.to_string()))
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

#[async_trait]
impl SecureStorage for KeychainStorage {
    async fn store(&self, key: &str, value: &[u8], policy: AccessPolicy) -> Result<()> {
        let entry = self.entry(key)?;
        // keychain entries are strings
        let encoded = base64::engine::general_purpose::STANDARD.encode(value);
        entry
            .set_password(&encoded)
            .map_err(|e| WalletError::StoreUnavailable(e.to_string()))?;
        if policy.requires_user() {
            debug!("Keychain cannot gate {} on user presence, relying on the login session", key);
        }
        debug!("Stored {} in keychain", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str, _options: &LoadOptions) -> Result<Option<Vec<u8>>> {
        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| WalletError::StoreUnavailable(format!("Corrupt keychain entry {}: {}", key, e))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(WalletError::StoreUnavailable(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                debug!("Deleted {} from keychain", key);
                Ok(())
            }
            Err(e) => Err(WalletError::StoreUnavailable(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.entry(key)?.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(WalletError::StoreUnavailable(e.to_string())),
        }
    }

    fn is_hardware_backed(&self) -> bool {
        self.available
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_keychain_reports_store_unavailable() {
        let storage = KeychainStorage {
            prefix: String::new(),
            available: false,
        };
        assert!(matches!(
            storage.exists("address").await,
            Err(WalletError::StoreUnavailable(_))
        ));
        assert!(matches!(
            storage
                .store("address", b"x", AccessPolicy::AlwaysThisDeviceOnly)
                .await,
            Err(WalletError::StoreUnavailable(_))
        ));
    }
}

//! Persisted configuration
//!
//! Plain JSON next to the local store, readable before the secret store is
//! unlocked since it carries the store's own KDF cost.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::crypto::KdfParams;
use crate::error::Result;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Network used for per-network local state
    pub network: String,
    /// Upper bound for one transaction-history lookup during discovery
    pub discovery_timeout_secs: u64,
    /// Argon2id cost for PIN-encrypted secrets
    pub pin_kdf: KdfParams,
    /// Argon2id cost for the encrypted-file store passphrase
    pub store_kdf: KdfParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            network: "mainnet".to_string(),
            discovery_timeout_secs: 10,
            pin_kdf: KdfParams::default(),
            store_kdf: KdfParams::default(),
        }
    }
}

impl Settings {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

const SETTINGS_FILE: &str = "settings.json";

/// Owns `settings.json` inside a data directory
pub struct SettingsManager {
    path: PathBuf,
    current: Settings,
}

impl SettingsManager {
    /// Load the settings of `dir`. A missing or unreadable file yields the
    /// defaults; an unreadable one is left on disk until the next update.
    pub fn new(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let current = match Self::read(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!("No settings at {:?}, using defaults", path);
                Settings::default()
            }
            Err(e) => {
                warn!("Ignoring unreadable settings at {:?}: {}", path, e);
                Settings::default()
            }
        };

        Self { path, current }
    }

    fn read(path: &Path) -> Result<Option<Settings>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// Apply `change` and persist the result. The in-memory settings only
    /// change once the file is written.
    pub async fn update(&mut self, change: impl FnOnce(&mut Settings)) -> Result<&Settings> {
        let mut next = self.current.clone();
        change(&mut next);

        let contents = serde_json::to_string_pretty(&next)?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        debug!("Saved settings to {:?}", self.path);

        self.current = next;
        Ok(&self.current)
    }

    /// Back to defaults; the file is removed
    pub async fn reset(&mut self) -> Result<()> {
        if self.path.exists() {
            tokio::fs::remove_file(&self.path).await?;
        }
        self.current = Settings::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path());

        let settings = manager.get();
        assert_eq!(settings.network, "mainnet");
        assert_eq!(settings.discovery_timeout(), Duration::from_secs(10));
        assert_eq!(settings.pin_kdf, KdfParams::default());
    }

    #[tokio::test]
    async fn test_update_persists() {
        let temp_dir = TempDir::new().unwrap();

        let mut manager = SettingsManager::new(temp_dir.path());
        let updated = manager
            .update(|s| {
                s.network = "goerli".to_string();
                s.pin_kdf = KdfParams::interactive();
            })
            .await
            .unwrap();
        assert_eq!(updated.network, "goerli");

        let reopened = SettingsManager::new(temp_dir.path());
        assert_eq!(reopened.get().network, "goerli");
        assert_eq!(reopened.get().pin_kdf, KdfParams::interactive());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SETTINGS_FILE), r#"{"discoveryTimeoutSecs": 3}"#).unwrap();

        let mut manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get().discovery_timeout_secs, 3);
        assert_eq!(manager.get().network, "mainnet");

        manager.reset().await.unwrap();
        assert_eq!(manager.get().discovery_timeout_secs, 10);
        assert!(!temp_dir.path().join(SETTINGS_FILE).exists());
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SETTINGS_FILE), "{ not json").unwrap();

        let manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get(), &Settings::default());
    }
}

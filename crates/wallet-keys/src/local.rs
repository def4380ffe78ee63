//! Non-secret application state
//!
//! A flat JSON object persisted next to the settings file. Holds the
//! migration version, the integrity status, per-account UI state and the
//! collections the migrations rewrite (contacts, token lists, coin lists).

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::address::Address;
use crate::error::Result;

const MIGRATION_VERSION: &str = "migrationVersion";
const KEYCHAIN_INTEGRITY_STATE: &str = "keychainIntegrityState";
const ACCOUNT_EMPTY: &str = "accountEmpty";
const CONTACTS: &str = "contacts";
const USER_LISTS: &str = "userLists";
const PINNED_COINS: &str = "pinnedCoins";
const HIDDEN_COINS: &str = "hiddenCoins";
const ASSETS: &str = "assets";
const WEB_DATA_ENABLED: &str = "webDataEnabled";
pub const REVIEW_ASKED: &str = "reviewAsked";
pub const IMAGE_METADATA: &str = "imageMetadata";

pub const INTEGRITY_DONE: &str = "done";

/// Networks whose assets are keyed `{address}_{network}`
const L2_ASSET_TYPES: [&str; 3] = ["arbitrum", "optimism", "polygon"];

fn account_key(prefix: &str, address: &Address, network: &str) -> String {
    format!("{}|{}|{}", prefix, address.to_lowercase_hex(), network)
}

/// Contact colour: palette index, or a hex string from older releases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorRef {
    Index(u32),
    Hex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Address or ENS name
    pub address: String,
    pub nickname: String,
    pub color: ColorRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl UserList {
    pub fn stablecoins() -> Self {
        Self {
            id: "stablecoins".to_string(),
            name: "Stablecoins".to_string(),
            tokens: vec![
                "0x6b175474e89094c44da98b954eedeac495271d0f".to_string(),
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
                "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            ],
        }
    }
}

/// Cached asset metadata, enough to rewrite coin ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub network: String,
}

impl AssetRef {
    pub fn is_l2(&self) -> bool {
        L2_ASSET_TYPES.contains(&self.kind.as_str())
    }

    /// Id used in pinned and hidden coin lists
    pub fn coin_id(&self) -> String {
        if self.is_l2() {
            format!("{}_{}", self.address, self.network)
        } else {
            self.address.clone()
        }
    }
}

pub struct LocalStore {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    values: RwLock<Map<String, Value>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(Map::new()),
        }
    }

    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("local.json");
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Map::new()
        };
        debug!("Local store opened at {:?} ({} keys)", path, values.len());

        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    async fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(values)?;

        // Write atomically using temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Values that no longer parse as `T` read as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.values.read().await;
        let value = values.get(key)?.clone();
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring malformed local value {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value);
        self.persist(&values).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().await;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }

    pub async fn migration_version(&self) -> usize {
        self.get(MIGRATION_VERSION).await.unwrap_or(0)
    }

    pub async fn set_migration_version(&self, version: usize) -> Result<()> {
        self.set(MIGRATION_VERSION, &version).await
    }

    pub async fn keychain_integrity_state(&self) -> Option<String> {
        self.get(KEYCHAIN_INTEGRITY_STATE).await
    }

    pub async fn save_keychain_integrity_state(&self, state: &str) -> Result<()> {
        self.set(KEYCHAIN_INTEGRITY_STATE, &state).await
    }

    pub async fn account_empty_state(&self, address: &Address, network: &str) -> Option<bool> {
        self.get(&account_key(ACCOUNT_EMPTY, address, network)).await
    }

    pub async fn save_account_empty_state(&self, empty: bool, address: &Address, network: &str) -> Result<()> {
        self.set(&account_key(ACCOUNT_EMPTY, address, network), &empty).await
    }

    pub async fn contacts(&self) -> Option<IndexMap<String, Contact>> {
        self.get(CONTACTS).await
    }

    pub async fn save_contacts(&self, contacts: &IndexMap<String, Contact>) -> Result<()> {
        self.set(CONTACTS, contacts).await
    }

    pub async fn user_lists(&self) -> Option<Vec<UserList>> {
        self.get(USER_LISTS).await
    }

    pub async fn save_user_lists(&self, lists: &[UserList]) -> Result<()> {
        self.set(USER_LISTS, &lists).await
    }

    pub async fn pinned_coins(&self, address: &Address, network: &str) -> Vec<String> {
        self.get(&account_key(PINNED_COINS, address, network))
            .await
            .unwrap_or_default()
    }

    pub async fn save_pinned_coins(&self, coins: &[String], address: &Address, network: &str) -> Result<()> {
        self.set(&account_key(PINNED_COINS, address, network), &coins).await
    }

    pub async fn hidden_coins(&self, address: &Address, network: &str) -> Vec<String> {
        self.get(&account_key(HIDDEN_COINS, address, network))
            .await
            .unwrap_or_default()
    }

    pub async fn save_hidden_coins(&self, coins: &[String], address: &Address, network: &str) -> Result<()> {
        self.set(&account_key(HIDDEN_COINS, address, network), &coins).await
    }

    pub async fn assets(&self, address: &Address, network: &str) -> Vec<AssetRef> {
        self.get(&account_key(ASSETS, address, network))
            .await
            .unwrap_or_default()
    }

    pub async fn save_assets(&self, assets: &[AssetRef], address: &Address, network: &str) -> Result<()> {
        self.set(&account_key(ASSETS, address, network), &assets).await
    }

    pub async fn web_data_enabled(&self, address: &Address, network: &str) -> bool {
        self.get(&account_key(WEB_DATA_ENABLED, address, network))
            .await
            .unwrap_or(false)
    }

    pub async fn set_web_data_enabled(&self, enabled: bool, address: &Address, network: &str) -> Result<()> {
        self.set(&account_key(WEB_DATA_ENABLED, address, network), &enabled)
            .await
    }

    /// Unix millis of the last store-review prompt
    pub async fn review_asked(&self) -> Option<i64> {
        self.get(REVIEW_ASKED).await
    }

    pub async fn set_review_asked(&self, millis: i64) -> Result<()> {
        self.set(REVIEW_ASKED, &millis).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let local = LocalStore::in_memory();
        let address = Address::from_bytes([1; 20]);
        assert_eq!(local.migration_version().await, 0);
        assert!(local.keychain_integrity_state().await.is_none());
        assert!(local.pinned_coins(&address, "mainnet").await.is_empty());
        assert!(!local.web_data_enabled(&address, "mainnet").await);
    }

    #[tokio::test]
    async fn test_values_persist_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let address = Address::from_bytes([2; 20]);
        {
            let local = LocalStore::open(temp_dir.path()).unwrap();
            local.set_migration_version(7).await.unwrap();
            local
                .save_pinned_coins(&["eth".to_string()], &address, "mainnet")
                .await
                .unwrap();
            local.set(IMAGE_METADATA, &serde_json::json!({"a": 1})).await.unwrap();
            local.remove(IMAGE_METADATA).await.unwrap();
        }

        let local = LocalStore::open(temp_dir.path()).unwrap();
        assert_eq!(local.migration_version().await, 7);
        assert_eq!(local.pinned_coins(&address, "mainnet").await, vec!["eth"]);
        assert!(local.pinned_coins(&address, "goerli").await.is_empty());
        assert!(!local.contains(IMAGE_METADATA).await);
    }

    #[test]
    fn test_contact_colors_accept_both_forms() {
        let json = r##"{
            "0xabc": {"address": "0xabc", "nickname": "a", "color": 3},
            "bob.eth": {"address": "bob.eth", "nickname": "b", "color": "#FF494A"}
        }"##;
        let contacts: IndexMap<String, Contact> = serde_json::from_str(json).unwrap();
        assert_eq!(contacts["0xabc"].color, ColorRef::Index(3));
        assert_eq!(contacts["bob.eth"].color, ColorRef::Hex("#FF494A".to_string()));
    }

    #[test]
    fn test_coin_id() {
        let l2 = AssetRef {
            address: "0xtoken".to_string(),
            kind: "optimism".to_string(),
            network: "optimism".to_string(),
        };
        let l1 = AssetRef {
            kind: "token".to_string(),
            ..l2.clone()
        };
        assert_eq!(l2.coin_id(), "0xtoken_optimism");
        assert_eq!(l1.coin_id(), "0xtoken");
    }
}

//! Encrypted file storage backend
//!
//! Stores entries in a JSON file in the user's data directory.
//! Each value is individually encrypted with AES-256-GCM under a key
//! derived from the store passphrase.

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AccessPolicy, LoadOptions, SecureStorage};
use crate::crypto::{decrypt, decrypt_string, derive_key, encrypt, encrypt_string, generate_salt};
use crate::crypto::{Ciphertext, KdfParams, MasterKey};
use crate::error::{Result, WalletError};

const VERIFICATION_PLAINTEXT: &str = "wallet-keys-verification";

/// Encrypted file storage backend
pub struct EncryptedFileStorage {
    storage_dir: PathBuf,
    cache: Arc<RwLock<StorageCache>>,
    /// Present while the store is unlocked
    master_key: Arc<RwLock<Option<MasterKey>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    policy: AccessPolicy,
    /// `iv:tag:ciphertext`
    value: String,
}

#[derive(Debug, Default)]
struct StorageCache {
    entries: HashMap<String, StoredEntry>,
    dirty: bool,
}

/// File format for persistent storage
#[derive(Debug, Serialize, Deserialize)]
struct StorageFile {
    version: u32,
    entries: HashMap<String, StoredEntry>,
}

impl EncryptedFileStorage {
    pub fn with_dir(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir)?;
        debug!("Encrypted file storage initialized at: {:?}", storage_dir);

        Ok(Self {
            storage_dir,
            cache: Arc::new(RwLock::new(StorageCache::default())),
            master_key: Arc::new(RwLock::new(None)),
        })
    }

    pub fn default_storage_dir() -> Result<PathBuf> {
        ProjectDirs::from("org", "wallet-keys", "wallet-keys")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                WalletError::StoreUnavailable("Could not determine data directory".to_string())
            })
    }

    fn storage_file_path(&self) -> PathBuf {
        self.storage_dir.join("secrets.json")
    }

    fn salt_file_path(&self) -> PathBuf {
        self.storage_dir.join("salt")
    }

    fn verification_file_path(&self) -> PathBuf {
        self.storage_dir.join("verify")
    }

    pub fn is_initialized(&self) -> bool {
        self.salt_file_path().exists() && self.verification_file_path().exists()
    }

    pub async fn is_unlocked(&self) -> bool {
        self.master_key.read().await.is_some()
    }

    /// Derive the store key from `passphrase` and load the entries.
    ///
    /// The first unlock of an empty directory creates the salt and the
    /// verification record. Later unlocks fail with `InvalidPassphrase`
    /// when the derived key cannot open the verification record.
    pub async fn unlock(&self, passphrase: &str, params: KdfParams) -> Result<()> {
        let salt = match self.load_salt().await? {
            Some(salt) => salt,
            None => {
                let salt = generate_salt();
                tokio::fs::write(self.salt_file_path(), &salt).await?;
                info!("Initialized new encrypted store at {:?}", self.storage_dir);
                salt
            }
        };

        let key = derive_key(passphrase, &salt, params)?;
        let verification_path = self.verification_file_path();

        if verification_path.exists() {
            let sealed = tokio::fs::read_to_string(&verification_path).await?;
            match decrypt_string(sealed.trim(), &key) {
                Ok(plain) if plain == VERIFICATION_PLAINTEXT => {}
                _ => {
                    warn!("Store passphrase verification failed");
                    return Err(WalletError::InvalidPassphrase);
                }
            }
        } else {
            let sealed = encrypt_string(VERIFICATION_PLAINTEXT, &key)?;
            tokio::fs::write(&verification_path, sealed).await?;
        }

        *self.master_key.write().await = Some(key);
        self.load().await
    }

    /// Drop the key; entries stay on disk
    pub async fn lock(&self) {
        *self.master_key.write().await = None;
        debug!("Encrypted store locked");
    }

    async fn load_salt(&self) -> Result<Option<String>> {
        let path = self.salt_file_path();
        if !path.exists() {
            return Ok(None);
        }
        let salt = tokio::fs::read_to_string(&path).await?;
        Ok(Some(salt.trim().to_string()))
    }

    async fn load(&self) -> Result<()> {
        let path = self.storage_file_path();
        if !path.exists() {
            debug!("No existing storage file found");
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        let file: StorageFile = serde_json::from_str(&contents)?;

        let mut cache = self.cache.write().await;
        cache.entries = file.entries;
        cache.dirty = false;
        debug!("Loaded {} entries from storage", cache.entries.len());
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let mut cache = self.cache.write().await;
        if !cache.dirty {
            return Ok(());
        }

        let file = StorageFile {
            version: 1,
            entries: cache.entries.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;
        let path = self.storage_file_path();

        // Write atomically using a temp file
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        cache.dirty = false;
        debug!("Saved {} entries to storage", cache.entries.len());
        Ok(())
    }

    async fn key(&self) -> Result<MasterKey> {
        self.master_key
            .read()
            .await
            .clone()
            .ok_or(WalletError::StoreLocked)
    }
}

#[async_trait]
impl SecureStorage for EncryptedFileStorage {
    async fn store(&self, key: &str, value: &[u8], policy: AccessPolicy) -> Result<()> {
        let master_key = self.key().await?;
        let sealed = encrypt(value, &master_key)?.to_string();

        {
            let mut cache = self.cache.write().await;
            cache.entries.insert(
                key.to_string(),
                StoredEntry {
                    policy,
                    value: sealed,
                },
            );
            cache.dirty = true;
        }

        self.save().await?;
        debug!("Stored key: {}", key);
        Ok(())
    }

    async fn retrieve(&self, key: &str, _options: &LoadOptions) -> Result<Option<Vec<u8>>> {
        let master_key = self.key().await?;
        let cache = self.cache.read().await;

        match cache.entries.get(key) {
            Some(entry) => {
                let sealed: Ciphertext = entry.value.parse()?;
                Ok(Some(decrypt(&sealed, &master_key)?))
            }
            None => {
                debug!("Key not found: {}", key);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.key().await?;
        let removed = {
            let mut cache = self.cache.write().await;
            let removed = cache.entries.remove(key).is_some();
            cache.dirty |= removed;
            removed
        };

        if removed {
            self.save().await?;
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.key().await?;
        Ok(self.cache.read().await.entries.contains_key(key))
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "Encrypted File Storage"
    }
}

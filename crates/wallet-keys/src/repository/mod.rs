//! Wallet creation, import, account management and secret persistence
//!
//! The repository is the only writer of the wallet collection and of the
//! secret records. Callers serialize mutating calls; there is no internal
//! locking.

mod discovery;
mod records;

pub use discovery::{AccountDiscovery, DiscoveredAccount};
pub use records::{AllWalletsData, PrivateKeyData, SeedPhraseData, SelectedWalletData};

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::address::Address;
use crate::auth::Authenticator;
use crate::crypto::{PinEncryptor, SecretString};
use crate::derive::{self, DerivedAccount, DerivedWallet, HdRoot, WalletKind};
use crate::error::{Result, WalletError};
use crate::history::TransactionHistory;
use crate::local::LocalStore;
use crate::model::{Account, AccountUpdate, BackupType, Wallet, WalletCollection, DEFAULT_WALLET_NAME};
use crate::profile::address_hashed_color_index;
use crate::settings::Settings;
use crate::storage::keys;
use crate::storage::{AccessPolicy, LoadOptions, SecretStore};
use records::*;

const AUTHENTICATION_PROMPT: &str = "Please authenticate";
const PUBLIC: AccessPolicy = AccessPolicy::AlwaysThisDeviceOnly;

/// Keys removed by `clean_up_wallet_keys`
const TOP_LEVEL_KEYS: [&str; 5] = [
    keys::ADDRESS,
    keys::ALL_WALLETS,
    keys::OLD_SEED_PHRASE_MIGRATED,
    keys::PIN,
    keys::SELECTED_WALLET,
];

/// Input to `create_wallet` and `init`
#[derive(Debug, Default)]
pub struct NewWallet {
    /// Mnemonic, raw seed, private key or address to import; `None`
    /// generates a fresh mnemonic
    pub seed: Option<SecretString>,
    pub color: Option<u32>,
    pub name: Option<String>,
    pub overwrite: bool,
    /// Derivation already performed by the caller for `seed`
    pub checked_wallet: Option<DerivedWallet>,
}

impl NewWallet {
    pub fn generate() -> Self {
        Self::default()
    }

    pub fn import(seed: impl Into<SecretString>) -> Self {
        Self {
            seed: Some(seed.into()),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_checked_wallet(mut self, wallet: DerivedWallet) -> Self {
        self.checked_wallet = Some(wallet);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn is_import(&self) -> bool {
        self.seed.as_ref().is_some_and(|s| !s.expose().trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInitialized {
    pub is_new: bool,
    pub wallet_address: Option<Address>,
}

/// Primary key pair of a created wallet
#[derive(Debug)]
pub struct CreatedWallet {
    pub id: String,
    pub address: Address,
    /// Absent for read-only wallets
    pub private_key: Option<SecretString>,
}

/// Result of a legacy secret migration
#[derive(Debug)]
pub struct MigratedSecrets {
    pub kind: WalletKind,
    pub address: Address,
    pub private_key: SecretString,
    pub seed: SecretString,
}

/// Wallet state handed to the UI after startup
#[derive(Debug, Clone)]
pub struct WalletsState {
    pub wallets: WalletCollection,
    pub selected: Wallet,
    pub account_address: Address,
}

pub struct WalletRepository {
    store: SecretStore,
    local: Arc<LocalStore>,
    history: Arc<dyn TransactionHistory>,
    auth: Arc<dyn Authenticator>,
    settings: Settings,
    encryptor: PinEncryptor,
}

impl WalletRepository {
    pub fn new(
        store: SecretStore,
        local: Arc<LocalStore>,
        history: Arc<dyn TransactionHistory>,
        auth: Arc<dyn Authenticator>,
        settings: Settings,
    ) -> Self {
        let encryptor = PinEncryptor::new(settings.pin_kdf);
        Self {
            store,
            local,
            history,
            auth,
            settings,
            encryptor,
        }
    }

    pub fn store(&self) -> &SecretStore {
        &self.store
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn prompt() -> LoadOptions {
        LoadOptions::prompt(AUTHENTICATION_PROMPT)
    }

    fn private_policy(&self) -> AccessPolicy {
        AccessPolicy::UserPresence {
            biometric: self.auth.supports_biometrics(),
        }
    }

    // --- PIN handling ---

    /// PIN to encrypt new secrets with, `None` when biometrics gate the store
    async fn pin_for_write(&self) -> Result<Option<String>> {
        if self.auth.supports_biometrics() {
            return Ok(None);
        }
        match self.auth.existing_pin().await? {
            Some(pin) => Ok(Some(pin)),
            None => self.auth.authenticate_with_pin().await.map(Some),
        }
    }

    /// PIN to decrypt stored secrets with, `None` when biometrics gate the store
    async fn pin_for_read(&self) -> Result<Option<String>> {
        if self.auth.supports_biometrics() {
            return Ok(None);
        }
        self.auth.authenticate_with_pin().await.map(Some)
    }

    fn seal(&self, pin: Option<&str>, plaintext: &str) -> Result<String> {
        match pin {
            Some(pin) => self.encryptor.encrypt(pin, plaintext),
            None => Ok(plaintext.to_string()),
        }
    }

    fn unseal(&self, pin: Option<&str>, stored: String) -> Result<SecretString> {
        match pin {
            Some(pin) => self.encryptor.decrypt(pin, &stored),
            None => Ok(SecretString::new(stored)),
        }
    }

    // --- Public records ---

    pub async fn load_address(&self) -> Result<Option<Address>> {
        let Some(raw) = self.store.load_string(keys::ADDRESS, &LoadOptions::default()).await? else {
            return Ok(None);
        };
        match raw.parse() {
            Ok(address) => Ok(Some(address)),
            Err(e) => {
                warn!("Ignoring malformed stored address: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn save_address(&self, address: &Address) -> Result<()> {
        self.store
            .save_string(keys::ADDRESS, &address.to_checksum(), PUBLIC)
            .await
    }

    pub async fn get_all_wallets(&self) -> Result<Option<WalletCollection>> {
        let data: Option<AllWalletsData> = self
            .store
            .load_object(keys::ALL_WALLETS, &LoadOptions::default())
            .await?;
        Ok(data.map(|d| d.wallets))
    }

    pub async fn save_all_wallets(&self, wallets: &WalletCollection) -> Result<()> {
        let data = AllWalletsData {
            version: ALL_WALLETS_VERSION,
            wallets: wallets.clone(),
        };
        self.store.save_object(keys::ALL_WALLETS, &data, PUBLIC).await
    }

    pub async fn get_selected_wallet(&self) -> Result<Option<Wallet>> {
        let data: Option<SelectedWalletData> = self
            .store
            .load_object(keys::SELECTED_WALLET, &LoadOptions::default())
            .await?;
        Ok(data.map(|d| d.wallet))
    }

    pub async fn set_selected_wallet(&self, wallet: &Wallet) -> Result<()> {
        let data = SelectedWalletData {
            version: SELECTED_WALLET_VERSION,
            wallet: wallet.clone(),
        };
        self.store.save_object(keys::SELECTED_WALLET, &data, PUBLIC).await
    }

    /// Persist the collection and refresh the selection record when the
    /// selected wallet is part of it
    pub async fn update_wallets(&self, wallets: &WalletCollection) -> Result<()> {
        self.save_all_wallets(wallets).await?;
        if let Some(selected) = self.get_selected_wallet().await? {
            if let Some(current) = wallets.get(&selected.id) {
                if *current != selected {
                    self.set_selected_wallet(current).await?;
                }
            }
        }
        Ok(())
    }

    // --- Secret records ---

    async fn save_private_key(&self, address: &Address, stored: String) -> Result<()> {
        let record = PrivateKeyData {
            address: *address,
            private_key: stored,
            version: PRIVATE_KEY_VERSION,
        };
        self.store
            .save_object(&keys::private_key_key(address), &record, self.private_policy())
            .await
    }

    /// Stored form, PIN ciphertext on devices without biometrics
    async fn get_private_key(&self, address: &Address) -> Result<Option<String>> {
        let record: Option<PrivateKeyData> = self
            .store
            .load_object(&keys::private_key_key(address), &Self::prompt())
            .await?;
        Ok(record.map(|mut r| std::mem::take(&mut r.private_key)))
    }

    async fn save_seed_phrase(&self, wallet_id: &str, stored: String) -> Result<()> {
        let record = SeedPhraseData {
            id: wallet_id.to_string(),
            seedphrase: stored,
            version: SEED_PHRASE_VERSION,
        };
        self.store
            .save_object(&keys::seed_phrase_key(wallet_id), &record, self.private_policy())
            .await
    }

    async fn get_seed_phrase(&self, wallet_id: &str) -> Result<Option<String>> {
        let record: Option<SeedPhraseData> = self
            .store
            .load_object(&keys::seed_phrase_key(wallet_id), &Self::prompt())
            .await?;
        Ok(record.map(|mut r| std::mem::take(&mut r.seedphrase)))
    }

    pub async fn secrets_migrated(&self) -> Result<bool> {
        self.store.has_key(keys::OLD_SEED_PHRASE_MIGRATED).await
    }

    async fn mark_secrets_migrated(&self) -> Result<()> {
        self.store
            .save_string(keys::OLD_SEED_PHRASE_MIGRATED, "true", PUBLIC)
            .await
    }

    /// Move the pre-multiwallet `seedPhrase` record into the per-wallet and
    /// per-address format. Already migrated records are left untouched.
    pub async fn migrate_secrets(&self) -> Result<Option<MigratedSecrets>> {
        let Some(legacy) = self.store.load_string(keys::SEED_PHRASE, &Self::prompt()).await? else {
            debug!("No legacy seed phrase, nothing to migrate");
            self.mark_secrets_migrated().await?;
            return Ok(None);
        };
        let legacy = SecretString::new(legacy);

        let kind = derive::classify(legacy.expose());
        let account = match kind {
            WalletKind::PrivateKey => derive::derive_from_private_key(legacy.expose())?,
            WalletKind::Mnemonic => derive::derive_from_mnemonic(legacy.expose(), 0)?,
            WalletKind::Seed => derive::derive_from_seed_bytes(legacy.expose())?,
            WalletKind::ReadOnly => {
                warn!("Legacy seed record holds an address, skipping migration");
                return Ok(None);
            }
        };

        let mut pin = None;
        if !self.store.has_key(&keys::private_key_key(&account.address)).await? {
            pin = self.pin_for_write().await?;
            let stored = self.seal(pin.as_deref(), account.private_key.expose())?;
            self.save_private_key(&account.address, stored).await?;
            info!("Migrated legacy private key for {}", account.address);
        }

        let Some(wallet) = self.get_selected_wallet().await? else {
            warn!("No selected wallet yet, legacy seed migration postponed");
            return Ok(None);
        };

        if !self.store.has_key(&keys::seed_phrase_key(&wallet.id)).await? {
            if pin.is_none() {
                pin = self.pin_for_write().await?;
            }
            let stored = self.seal(pin.as_deref(), legacy.expose())?;
            self.save_seed_phrase(&wallet.id, stored).await?;
            info!("Migrated legacy seed phrase into wallet {}", wallet.id);
        }

        self.mark_secrets_migrated().await?;
        Ok(Some(MigratedSecrets {
            kind,
            address: account.address,
            private_key: account.private_key,
            seed: legacy,
        }))
    }

    /// Private key for `address`, or for the selected account when `None`
    pub async fn load_private_key(&self, address: Option<&Address>) -> Result<Option<SecretString>> {
        if !self.secrets_migrated().await? {
            if let Some(migrated) = self.migrate_secrets().await? {
                if address.map_or(true, |a| *a == migrated.address) {
                    return Ok(Some(migrated.private_key));
                }
            }
        }

        let address = match address {
            Some(address) => *address,
            None => match self.load_address().await? {
                Some(address) => address,
                None => return Ok(None),
            },
        };

        let Some(stored) = self.get_private_key(&address).await? else {
            return Ok(None);
        };
        let pin = self.pin_for_read().await?;
        self.unseal(pin.as_deref(), stored).map(Some)
    }

    pub async fn load_seed_phrase_and_migrate_if_needed(&self, wallet_id: &str) -> Result<Option<SecretString>> {
        if !self.store.has_key(&keys::seed_phrase_key(wallet_id)).await? {
            if self.secrets_migrated().await? {
                warn!("Seed phrase for {} missing and nothing left to migrate", wallet_id);
                return Ok(None);
            }
            debug!("Seed phrase for {} not found, running legacy migration", wallet_id);
            return Ok(self.migrate_secrets().await?.map(|m| m.seed));
        }

        let Some(stored) = self.get_seed_phrase(wallet_id).await? else {
            return Ok(None);
        };
        let pin = self.pin_for_read().await?;
        self.unseal(pin.as_deref(), stored).map(Some)
    }

    /// Best-effort removal of the top-level wallet keys. Returns `false`
    /// only when the store itself cannot be reached.
    pub async fn clean_up_wallet_keys(&self) -> bool {
        let mut reachable = true;
        for key in TOP_LEVEL_KEYS {
            if let Err(e) = self.store.remove(key).await {
                warn!("Failed to delete {}: {}", key, e);
                if matches!(e, WalletError::StoreUnavailable(_) | WalletError::StoreLocked) {
                    reachable = false;
                }
            }
        }
        reachable
    }

    // --- Wallet workflows ---

    /// Import when a seed is given, otherwise load the existing wallet or
    /// create the first one. Creation failures are logged and reported as
    /// a missing address.
    pub async fn init(&self, new: NewWallet, network: &str) -> Result<WalletInitialized> {
        if new.is_import() {
            let wallet_address = match self.create_wallet(new).await {
                Ok(created) => Some(created.address),
                Err(e) => {
                    error!("Wallet import failed: {}", e);
                    None
                }
            };
            return Ok(WalletInitialized {
                is_new: false,
                wallet_address,
            });
        }

        if let Some(address) = self.load_address().await? {
            return Ok(WalletInitialized {
                is_new: false,
                wallet_address: Some(address),
            });
        }

        let wallet_address = match self.create_wallet(NewWallet { seed: None, ..new }).await {
            Ok(created) => Some(created.address),
            Err(e) => {
                error!("Wallet creation failed: {}", e);
                None
            }
        };
        if let Some(address) = &wallet_address {
            self.local.save_account_empty_state(true, address, network).await?;
        }
        Ok(WalletInitialized {
            is_new: true,
            wallet_address,
        })
    }

    pub async fn create_wallet(&self, new: NewWallet) -> Result<CreatedWallet> {
        let imported = new.is_import();
        let seed = match new.seed.filter(|_| imported) {
            Some(seed) => seed,
            None => derive::generate_mnemonic()?,
        };
        let derived = match new.checked_wallet {
            Some(checked) => checked,
            None => derive::derive_from_input(seed.expose())?,
        };
        let address = derived.address;
        let mut wallets = self.get_all_wallets().await?.unwrap_or_default();

        let mut existing_id = None;
        if imported {
            if let Some(existing) = wallets.values().find(|w| w.has_visible_account(&address)) {
                if !new.overwrite {
                    info!("Rejecting import of {}: already visible in {}", address, existing.id);
                    return Err(WalletError::DuplicateImport);
                }
                existing_id = Some(existing.id.clone());
            }
        }
        let id = existing_id.unwrap_or_else(|| format!("wallet_{}", Uuid::new_v4().simple()));
        let read_only = derived.kind.is_read_only();

        let pin = if read_only { None } else { self.pin_for_write().await? };

        // seed, then address, then private key
        if !read_only {
            let seed_value = if derived.kind == WalletKind::Mnemonic {
                derive::normalize_mnemonic(seed.expose())
            } else {
                SecretString::new(seed.expose().trim().to_string())
            };
            let stored = self.seal(pin.as_deref(), seed_value.expose())?;
            self.save_seed_phrase(&id, stored).await?;
        }
        self.save_address(&address).await?;
        if let Some(private_key) = &derived.private_key {
            let stored = self.seal(pin.as_deref(), private_key.expose())?;
            self.save_private_key(&address, stored).await?;
        }

        let network = self.settings.network.clone();
        let color = new.color.unwrap_or_else(|| address_hashed_color_index(&address));
        let mut addresses = vec![Account::new(0, address, color, new.name.clone().unwrap_or_default())];
        if !read_only {
            self.local.set_web_data_enabled(true, &address, &network).await?;
        }

        if let (true, Some(root)) = (imported, derived.root.as_ref()) {
            let discovered = self
                .discover_accounts(root, &id, pin.as_deref(), &mut wallets)
                .await?;
            addresses.extend(discovered);
        }

        let name = match &new.name {
            Some(name) if imported && addresses.len() > 1 => name.clone(),
            _ => DEFAULT_WALLET_NAME.to_string(),
        };
        let has_other_primary = wallets.values().any(|w| w.primary && w.id != id);
        let primary = (!imported || derived.kind == WalletKind::Mnemonic) && !has_other_primary;

        let wallet = Wallet {
            id: id.clone(),
            kind: derived.kind,
            imported,
            primary,
            backed_up: false,
            backup_date: None,
            backup_type: None,
            backup_file: None,
            name,
            color: new.color.unwrap_or(0),
            addresses,
            damaged: false,
        };
        wallets.insert(id.clone(), wallet.clone());

        self.set_selected_wallet(&wallet).await?;
        self.save_all_wallets(&wallets).await?;

        info!(
            "Created {:?} wallet {} with {} account(s) (imported: {}, primary: {})",
            wallet.kind,
            id,
            wallet.addresses.len(),
            imported,
            primary
        );
        Ok(CreatedWallet {
            id,
            address,
            private_key: derived.private_key,
        })
    }

    /// Restore child accounts with history. An adopted address that some
    /// other wallet already holds takes over that account's label and
    /// colour when it was visible, and the other wallet is dropped.
    async fn discover_accounts(
        &self,
        root: &HdRoot,
        wallet_id: &str,
        pin: Option<&str>,
        wallets: &mut WalletCollection,
    ) -> Result<Vec<Account>> {
        let network = self.settings.network.clone();
        let mut discovery = AccountDiscovery::new(self.settings.discovery_timeout());
        let mut accounts = Vec::new();

        while let Some(found) = discovery.step(root, self.history.as_ref()).await? {
            let address = found.account.address;
            let mut color = address_hashed_color_index(&address);
            let mut label = String::new();

            let superseded = wallets
                .values()
                .find_map(|w| w.account(&address).map(|a| (w.id.clone(), a.clone())));
            if let Some((other_id, account)) = superseded {
                if account.visible {
                    color = account.color;
                    label = account.label;
                }
                if other_id != wallet_id {
                    info!("Account {} moves from wallet {} to {}", address, other_id, wallet_id);
                    wallets.shift_remove(&other_id);
                }
            }

            let stored = self.seal(pin, found.account.private_key.expose())?;
            self.save_private_key(&address, stored).await?;
            self.local.set_web_data_enabled(true, &address, &network).await?;
            accounts.push(Account::new(found.index, address, color, label));
        }

        Ok(accounts)
    }

    /// Derive and persist the key pair at `index` of an HD wallet
    pub async fn generate_account(&self, wallet_id: &str, index: u32) -> Result<DerivedAccount> {
        let migrated = if self.secrets_migrated().await? {
            None
        } else {
            self.migrate_secrets().await?
        };

        // one prompt covers reading the seed and sealing the new key
        let pin = self.pin_for_read().await?;
        let seed = match migrated {
            Some(migrated) => migrated.seed,
            None => {
                let stored = self
                    .get_seed_phrase(wallet_id)
                    .await?
                    .ok_or_else(|| WalletError::SecretNotFound(keys::seed_phrase_key(wallet_id)))?;
                self.unseal(pin.as_deref(), stored)?
            }
        };

        let root = match derive::classify(seed.expose()) {
            WalletKind::Mnemonic => HdRoot::from_mnemonic(seed.expose())?,
            WalletKind::Seed => HdRoot::from_seed_hex(seed.expose())?,
            kind => {
                return Err(WalletError::DerivationFailure(format!(
                    "{:?} wallet {} cannot derive accounts",
                    kind, wallet_id
                )))
            }
        };
        let account = root.derive_account(index)?;

        let stored = self.seal(pin.as_deref(), account.private_key.expose())?;
        self.save_private_key(&account.address, stored).await?;
        debug!("Generated account {} at index {} for {}", account.address, index, wallet_id);
        Ok(account)
    }

    /// Append the next account to a wallet and select it
    pub async fn create_account_for_wallet(
        &self,
        wallet_id: &str,
        color: Option<u32>,
        name: &str,
    ) -> Result<Account> {
        let mut wallets = self.get_all_wallets().await?.unwrap_or_default();
        let index = wallets
            .get(wallet_id)
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))?
            .next_account_index();

        let derived = self.generate_account(wallet_id, index).await?;
        let color = color.unwrap_or_else(|| address_hashed_color_index(&derived.address));
        let account = Account::new(index, derived.address, color, name);

        let wallet = wallets
            .get_mut(wallet_id)
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))?;
        wallet.addresses.push(account.clone());
        let wallet = wallet.clone();

        self.local
            .set_web_data_enabled(true, &account.address, &self.settings.network)
            .await?;
        self.save_all_wallets(&wallets).await?;
        self.save_address(&account.address).await?;
        self.set_selected_wallet(&wallet).await?;

        info!("Added account {} at index {} to {}", account.address, index, wallet_id);
        Ok(account)
    }

    /// Rename, recolour or hide an account
    pub async fn update_account(
        &self,
        wallet_id: &str,
        address: &Address,
        update: AccountUpdate,
    ) -> Result<Wallet> {
        let mut wallets = self.get_all_wallets().await?.unwrap_or_default();
        let wallet = wallets
            .get_mut(wallet_id)
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))?;
        let account = wallet
            .account_mut(address)
            .ok_or_else(|| WalletError::AccountNotFound(address.to_string()))?;

        if let Some(label) = update.label {
            account.label = label;
        }
        if let Some(color) = update.color {
            account.color = color;
        }
        if let Some(visible) = update.visible {
            account.visible = visible;
        }
        let wallet = wallet.clone();

        self.update_wallets(&wallets).await?;
        Ok(wallet)
    }

    pub async fn set_wallet_backed_up(
        &self,
        wallet_id: &str,
        backup_type: BackupType,
        backup_file: Option<String>,
    ) -> Result<()> {
        let mut wallets = self.get_all_wallets().await?.unwrap_or_default();
        let wallet = wallets
            .get_mut(wallet_id)
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_string()))?;
        wallet.backed_up = true;
        wallet.backup_date = Some(chrono::Utc::now().timestamp_millis());
        wallet.backup_type = Some(backup_type);
        wallet.backup_file = backup_file;

        self.update_wallets(&wallets).await?;
        info!("Wallet {} marked as backed up ({:?})", wallet_id, backup_type);
        Ok(())
    }

    /// Load the collection for display. A selection that points at a
    /// missing wallet is repaired to the first wallet; a missing selection
    /// goes to the owner of the stored address, else the first wallet. An
    /// address that is not a visible account of the selection moves to its
    /// first visible account. Repairs are persisted.
    pub async fn wallets_load_state(&self, account_address: Option<Address>) -> Result<Option<WalletsState>> {
        let wallets = match self.get_all_wallets().await? {
            Some(wallets) if !wallets.is_empty() => wallets,
            _ => return Ok(None),
        };

        let selected = match self.get_selected_wallet().await? {
            Some(stored) => match wallets.get(&stored.id) {
                Some(current) => current.clone(),
                None => {
                    let Some(first) = wallets.values().next() else {
                        return Ok(None);
                    };
                    warn!("Selected wallet {} no longer exists, selecting {}", stored.id, first.id);
                    self.set_selected_wallet(first).await?;
                    first.clone()
                }
            },
            None => {
                let keychain_address = self.load_address().await?;
                let owner = keychain_address
                    .and_then(|address| wallets.values().find(|w| w.account(&address).is_some()));
                let (repaired, reason) = match owner {
                    Some(wallet) => (wallet, "owner of the stored address"),
                    None => match wallets.values().next() {
                        Some(first) => (first, "first wallet"),
                        None => return Ok(None),
                    },
                };
                info!("Selecting wallet {} ({})", repaired.id, reason);
                self.set_selected_wallet(repaired).await?;
                repaired.clone()
            }
        };

        let current = match account_address {
            Some(address) => Some(address),
            None => self.load_address().await?,
        };

        let account_address = match current.filter(|a| selected.has_visible_account(a)) {
            Some(address) => address,
            None => {
                let account = selected
                    .first_visible_account()
                    .or_else(|| selected.addresses.first())
                    .ok_or_else(|| WalletError::AccountNotFound(format!("no accounts in {}", selected.id)))?;
                info!("Switching selected address to {}", account.address);
                self.save_address(&account.address).await?;
                account.address
            }
        };

        Ok(Some(WalletsState {
            wallets,
            selected,
            account_address,
        }))
    }

    /// Recoverable signature over `digest` with the account's private key
    pub async fn sign_digest(&self, address: Option<&Address>, digest: &[u8; 32]) -> Result<String> {
        let private_key = self
            .load_private_key(address)
            .await?
            .ok_or_else(|| WalletError::SecretNotFound(keys::PRIVATE_KEY.to_string()))?;
        derive::sign_digest(private_key.expose(), digest)
    }
}

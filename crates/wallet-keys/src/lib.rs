//! # wallet-keys
//!
//! Key management for an Ethereum wallet:
//! - BIP-39/BIP-32 derivation of accounts from mnemonics and raw seeds
//! - Secret persistence in the OS keychain or an AES-256-GCM encrypted file
//! - PIN encryption for devices without biometric gating
//! - Versioned startup migrations and a keychain integrity check

pub mod address;
pub mod auth;
pub mod crypto;
pub mod derive;
pub mod error;
pub mod history;
pub mod integrity;
pub mod local;
pub mod migrations;
pub mod model;
pub mod profile;
pub mod repository;
pub mod settings;
pub mod storage;

pub use address::Address;
pub use auth::{Authenticator, FixedPin, TrustedDevice};
pub use crypto::{KdfParams, PinEncryptor, SecretString};
pub use derive::{DerivedAccount, DerivedWallet, HdRoot, WalletKind};
pub use error::{Result, WalletError};
pub use history::{NoHistory, TransactionHistory};
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use local::LocalStore;
pub use migrations::{Migration, MigrationContext, MigrationOutcome, MigrationRunner};
pub use model::{Account, AccountUpdate, BackupType, Wallet, WalletCollection};
pub use repository::{CreatedWallet, NewWallet, WalletInitialized, WalletRepository, WalletsState};
pub use settings::{Settings, SettingsManager};
pub use storage::{
    AccessPolicy, EncryptedFileStorage, KeychainStorage, LoadOptions, MemoryStorage, SecretStore,
    SecureStorage,
};

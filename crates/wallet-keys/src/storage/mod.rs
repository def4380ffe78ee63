//! Secret storage backends and the typed adapter on top of them
//!
//! Backends:
//! 1. OS keychain (hardware-backed where available)
//! 2. Encrypted file (fallback, passphrase protected)
//! 3. Memory (tests and ephemeral sessions)

mod encrypted_file;
mod keychain;
pub mod keys;
mod memory;
mod secret_store;
mod traits;

pub use encrypted_file::EncryptedFileStorage;
pub use keychain::KeychainStorage;
pub use memory::{BiometricStrength, MemoryStorage};
pub use secret_store::SecretStore;
pub use traits::{AccessPolicy, LoadOptions, SecureStorage};

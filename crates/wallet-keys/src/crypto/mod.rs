//! Cryptographic primitives for secret persistence
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption
//! - Argon2id key derivation from passphrases and PINs
//! - PIN-based encryption of wallet secrets
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod pin;
mod secure_memory;

pub use encryption::{decrypt, decrypt_string, encrypt, encrypt_string, Ciphertext};
pub use key_derivation::{derive_key, generate_salt, KdfParams};
pub use pin::PinEncryptor;
pub use secure_memory::{MasterKey, SecretString};

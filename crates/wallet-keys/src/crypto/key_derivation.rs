//! Passphrase and PIN key derivation using Argon2id

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::MasterKey;
use crate::error::{Result, WalletError};

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Lighter preset for devices where every secret read prompts for a PIN
    pub fn interactive() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Generate a random salt, base64 encoded without padding
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Derive a 256-bit key from a passphrase or PIN
pub fn derive_key(secret: &str, salt: &str, params: KdfParams) -> Result<MasterKey> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| WalletError::KeyDerivationError(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let salt = SaltString::from_b64(salt)
        .map_err(|e| WalletError::KeyDerivationError(format!("Invalid salt: {}", e)))?;

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| WalletError::KeyDerivationError(e.to_string()))?
        .hash
        .ok_or_else(|| WalletError::KeyDerivationError("No hash output".to_string()))?;

    MasterKey::from_slice(hash.as_bytes())
        .ok_or_else(|| WalletError::KeyDerivationError("Unexpected hash length".to_string()))
}

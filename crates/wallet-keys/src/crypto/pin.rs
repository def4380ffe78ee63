//! PIN encryption of wallet secrets
//!
//! Used on devices that cannot gate keychain entries behind biometrics.
//! Each message gets its own salt, so the output is
//! `{salt_b64}:{iv_hex}:{auth_tag_hex}:{ciphertext_hex}`.

use tracing::debug;

use super::{decrypt_string, derive_key, encrypt_string, generate_salt, KdfParams, SecretString};
use crate::error::{Result, WalletError};

#[derive(Debug, Clone, Default)]
pub struct PinEncryptor {
    params: KdfParams,
}

impl PinEncryptor {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn encrypt(&self, pin: &str, plaintext: &str) -> Result<String> {
        let salt = generate_salt();
        let key = derive_key(pin, &salt, self.params)?;
        let sealed = encrypt_string(plaintext, &key)?;
        Ok(format!("{}:{}", salt, sealed))
    }

    /// Fails with `DecryptionError` on a wrong PIN or a corrupted payload
    pub fn decrypt(&self, pin: &str, ciphertext: &str) -> Result<SecretString> {
        let (salt, sealed) = ciphertext.split_once(':').ok_or_else(|| {
            WalletError::DecryptionError("missing salt in PIN ciphertext".to_string())
        })?;
        let key = derive_key(pin, salt, self.params)
            .map_err(|e| WalletError::DecryptionError(e.to_string()))?;
        let plaintext = decrypt_string(sealed, &key)?;
        debug!("Decrypted PIN protected secret");
        Ok(SecretString::new(plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryptor() -> PinEncryptor {
        PinEncryptor::new(KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_roundtrip() {
        let enc = encryptor();
        let sealed = enc.encrypt("1234", "abandon ability able").unwrap();
        assert_eq!(enc.decrypt("1234", &sealed).unwrap().expose(), "abandon ability able");
    }

    #[test]
    fn test_wrong_pin_fails() {
        let enc = encryptor();
        let sealed = enc.encrypt("1234", "0xdeadbeef").unwrap();
        assert!(matches!(
            enc.decrypt("9999", &sealed),
            Err(WalletError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_corrupted_payload_fails() {
        let enc = encryptor();
        let mut sealed = enc.encrypt("1234", "0xdeadbeef").unwrap();
        let last = sealed.pop().unwrap();
        sealed.push(if last == '0' { '1' } else { '0' });
        assert!(matches!(
            enc.decrypt("1234", &sealed),
            Err(WalletError::DecryptionError(_))
        ));
        assert!(enc.decrypt("1234", "no-separators").is_err());
    }
}

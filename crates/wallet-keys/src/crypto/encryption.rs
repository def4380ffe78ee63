//! AES-256-GCM authenticated encryption
//!
//! Serialized form: `{iv_hex}:{auth_tag_hex}:{ciphertext_hex}`

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::MasterKey;
use crate::error::{Result, WalletError};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A sealed payload: nonce, GCM tag and ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    pub iv: [u8; IV_LEN],
    pub auth_tag: [u8; TAG_LEN],
    pub data: Vec<u8>,
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            hex::encode(self.iv),
            hex::encode(self.auth_tag),
            hex::encode(&self.data)
        )
    }
}

impl FromStr for Ciphertext {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let (Some(iv), Some(tag), Some(data), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(WalletError::DecryptionError(
                "expected iv:tag:ciphertext".to_string(),
            ));
        };

        let iv = decode_fixed::<IV_LEN>(iv, "IV")?;
        let auth_tag = decode_fixed::<TAG_LEN>(tag, "auth tag")?;
        let data = hex::decode(data)
            .map_err(|e| WalletError::DecryptionError(format!("Invalid ciphertext hex: {}", e)))?;

        Ok(Self { iv, auth_tag, data })
    }
}

fn decode_fixed<const N: usize>(part: &str, what: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(part)
        .map_err(|e| WalletError::DecryptionError(format!("Invalid {} hex: {}", what, e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        WalletError::DecryptionError(format!(
            "Invalid {} length: expected {}, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}

/// Encrypt plaintext with a fresh random nonce
pub fn encrypt(plaintext: &[u8], key: &MasterKey) -> Result<Ciphertext> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| WalletError::EncryptionError(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    // aes-gcm appends the tag to the ciphertext
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| WalletError::EncryptionError(e.to_string()))?;

    if sealed.len() < TAG_LEN {
        return Err(WalletError::EncryptionError("Ciphertext too short".to_string()));
    }
    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    let mut auth_tag = [0u8; TAG_LEN];
    auth_tag.copy_from_slice(&tag);

    Ok(Ciphertext {
        iv,
        auth_tag,
        data: sealed,
    })
}

/// Encrypt a string and return the serialized form
pub fn encrypt_string(plaintext: &str, key: &MasterKey) -> Result<String> {
    Ok(encrypt(plaintext.as_bytes(), key)?.to_string())
}

/// Decrypt and authenticate a sealed payload
pub fn decrypt(sealed: &Ciphertext, key: &MasterKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| WalletError::DecryptionError(e.to_string()))?;

    let mut data_with_tag = Vec::with_capacity(sealed.data.len() + TAG_LEN);
    data_with_tag.extend_from_slice(&sealed.data);
    data_with_tag.extend_from_slice(&sealed.auth_tag);

    cipher
        .decrypt(Nonce::from_slice(&sealed.iv), data_with_tag.as_slice())
        .map_err(|e| WalletError::DecryptionError(e.to_string()))
}

/// Decrypt the serialized form back into a string
pub fn decrypt_string(serialized: &str, key: &MasterKey) -> Result<String> {
    let sealed: Ciphertext = serialized.parse()?;
    let plaintext = decrypt(&sealed, key)?;
    String::from_utf8(plaintext)
        .map_err(|e| WalletError::DecryptionError(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> MasterKey {
        MasterKey::new([byte; 32])
    }

    #[test]
    fn test_string_roundtrip() {
        let key = key(7);
        let sealed = encrypt_string("0x4c0883a69102937d6231471b5dbb6204fe512961", &key).unwrap();
        assert_eq!(
            decrypt_string(&sealed, &key).unwrap(),
            "0x4c0883a69102937d6231471b5dbb6204fe512961"
        );
    }

    #[test]
    fn test_serialized_form_parses_back() {
        let sealed = encrypt(b"seed words", &key(1)).unwrap();
        let parsed: Ciphertext = sealed.to_string().parse().unwrap();
        assert_eq!(parsed, sealed);
    }

    #[test]
    fn test_fresh_nonce_per_message() {
        let key = key(3);
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let sealed = encrypt(b"secret", &key(1)).unwrap();
        assert!(matches!(
            decrypt(&sealed, &key(2)),
            Err(WalletError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_tampering_is_rejected() {
        let key = key(9);
        let mut sealed = encrypt(b"secret data", &key).unwrap();
        sealed.data[0] ^= 0xFF;
        assert!(decrypt(&sealed, &key).is_err());

        let mut sealed = encrypt(b"secret data", &key).unwrap();
        sealed.auth_tag[0] ^= 0xFF;
        assert!(decrypt(&sealed, &key).is_err());
    }

    #[test]
    fn test_malformed_input() {
        assert!("invalid".parse::<Ciphertext>().is_err());
        assert!("a:b".parse::<Ciphertext>().is_err());
        assert!("a:b:c:d".parse::<Ciphertext>().is_err());
        assert!("zz:zz:zz".parse::<Ciphertext>().is_err());
        assert!("00:00:00".parse::<Ciphertext>().is_err());
    }
}

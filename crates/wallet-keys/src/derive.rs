//! Wallet seed classification and HD account derivation
//!
//! Every function here is pure: nothing reads or writes the secret store.
//! Accounts follow the standard Ethereum path `m/44'/60'/0'/0/{index}`.

use std::fmt;

use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use k256::ecdsa::SigningKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::address::Address;
use crate::crypto::SecretString;
use crate::error::{Result, WalletError};

pub const DEFAULT_HD_PATH: &str = "m/44'/60'/0'/0";

/// What kind of secret a wallet was created from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WalletKind {
    Mnemonic,
    PrivateKey,
    /// Raw BIP-32 seed, kept for wallets imported by early releases
    Seed,
    ReadOnly,
}

impl WalletKind {
    pub fn is_read_only(self) -> bool {
        self == Self::ReadOnly
    }
}

/// A single derived key pair
#[derive(Debug, Clone)]
pub struct DerivedAccount {
    pub address: Address,
    pub private_key: SecretString,
}

/// Root of an HD wallet, able to derive any child account
#[derive(Clone)]
pub struct HdRoot {
    seed: Zeroizing<Vec<u8>>,
}

impl HdRoot {
    fn from_seed(seed: &[u8]) -> Result<Self> {
        if !(16..=64).contains(&seed.len()) {
            return Err(WalletError::DerivationFailure(format!(
                "Seed must be 16 to 64 bytes, got {}",
                seed.len()
            )));
        }
        Ok(Self {
            seed: Zeroizing::new(seed.to_vec()),
        })
    }

    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let mnemonic = parse_mnemonic(phrase)
            .ok_or_else(|| WalletError::DerivationFailure("Invalid mnemonic".to_string()))?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));
        Self::from_seed(seed.as_slice())
    }

    pub fn from_seed_hex(seed_hex: &str) -> Result<Self> {
        let seed = Zeroizing::new(
            hex::decode(strip_hex_prefix(seed_hex.trim()))
                .map_err(|e| WalletError::DerivationFailure(format!("Invalid seed hex: {}", e)))?,
        );
        Self::from_seed(&seed)
    }

    pub fn derive_account(&self, index: u32) -> Result<DerivedAccount> {
        let path: DerivationPath = format!("{}/{}", DEFAULT_HD_PATH, index)
            .parse()
            .map_err(|e| WalletError::DerivationFailure(format!("Invalid path index {}: {}", index, e)))?;
        let xprv = XPrv::derive_from_path(self.seed.as_slice(), &path)
            .map_err(|e| WalletError::DerivationFailure(e.to_string()))?;
        Ok(account_from_signing_key(xprv.private_key()))
    }
}

impl fmt::Debug for HdRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdRoot").field("seed", &"[REDACTED]").finish()
    }
}

/// Result of deriving a wallet from user input, reusable by callers
/// that validated the input beforehand.
#[derive(Debug, Clone)]
pub struct DerivedWallet {
    pub kind: WalletKind,
    pub address: Address,
    /// Absent for read-only wallets
    pub private_key: Option<SecretString>,
    /// Present for mnemonic and seed wallets
    pub root: Option<HdRoot>,
}

impl DerivedWallet {
    pub fn is_hd(&self) -> bool {
        self.root.is_some()
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_mnemonic(phrase: &str) -> Option<Mnemonic> {
    Mnemonic::parse_in_normalized(Language::English, &normalize_phrase(phrase)).ok()
}

fn is_private_key_hex(input: &str) -> bool {
    let body = strip_hex_prefix(input);
    body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit())
}

fn account_from_signing_key(key: &SigningKey) -> DerivedAccount {
    DerivedAccount {
        address: Address::from_verifying_key(key.verifying_key()),
        private_key: SecretString::new(format!("0x{}", hex::encode(key.to_bytes()))),
    }
}

fn signing_key_from_hex(private_key: &str) -> Result<SigningKey> {
    let bytes = Zeroizing::new(
        hex::decode(strip_hex_prefix(private_key.trim()))
            .map_err(|e| WalletError::DerivationFailure(format!("Invalid private key hex: {}", e)))?,
    );
    SigningKey::from_slice(&bytes)
        .map_err(|e| WalletError::DerivationFailure(format!("Invalid private key: {}", e)))
}

/// Decide which kind of secret the input is. Falls back to `Seed`.
pub fn classify(input: &str) -> WalletKind {
    let input = input.trim();
    if is_private_key_hex(input) {
        WalletKind::PrivateKey
    } else if parse_mnemonic(input).is_some() {
        WalletKind::Mnemonic
    } else if Address::is_valid(input) {
        WalletKind::ReadOnly
    } else {
        WalletKind::Seed
    }
}

/// Normalized form of a mnemonic: lowercase words separated by single spaces
pub fn normalize_mnemonic(phrase: &str) -> SecretString {
    SecretString::new(normalize_phrase(phrase))
}

pub fn derive_from_mnemonic(phrase: &str, index: u32) -> Result<DerivedAccount> {
    HdRoot::from_mnemonic(phrase)?.derive_account(index)
}

/// Legacy raw-seed wallets only ever used the first account
pub fn derive_from_seed_bytes(seed_hex: &str) -> Result<DerivedAccount> {
    HdRoot::from_seed_hex(seed_hex)?.derive_account(0)
}

pub fn derive_from_private_key(private_key: &str) -> Result<DerivedAccount> {
    Ok(account_from_signing_key(&signing_key_from_hex(private_key)?))
}

/// Classify the input and derive its primary account
pub fn derive_from_input(input: &str) -> Result<DerivedWallet> {
    let input = input.trim();
    let kind = classify(input);
    let (root, account) = match kind {
        WalletKind::PrivateKey => (None, derive_from_private_key(input)?),
        WalletKind::Mnemonic => {
            let root = HdRoot::from_mnemonic(input)?;
            let account = root.derive_account(0)?;
            (Some(root), account)
        }
        WalletKind::Seed => {
            let root = HdRoot::from_seed_hex(input)?;
            let account = root.derive_account(0)?;
            (Some(root), account)
        }
        WalletKind::ReadOnly => {
            return Ok(DerivedWallet {
                kind,
                address: input.parse()?,
                private_key: None,
                root: None,
            });
        }
    };
    Ok(DerivedWallet {
        kind,
        address: account.address,
        private_key: Some(account.private_key),
        root,
    })
}

/// Fresh 12-word English mnemonic from 128 bits of OS entropy
pub fn generate_mnemonic() -> Result<SecretString> {
    let mut entropy = Zeroizing::new([0u8; 16]);
    rand::rngs::OsRng.fill_bytes(&mut entropy[..]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..])
        .map_err(|e| WalletError::DerivationFailure(e.to_string()))?;
    Ok(SecretString::new(mnemonic.to_string()))
}

/// Recoverable secp256k1 signature over a 32-byte digest, hex encoded as
/// `0x{r}{s}{v}` with `v = 27 + recovery_id`.
pub fn sign_digest(private_key: &str, digest: &[u8; 32]) -> Result<String> {
    let key = signing_key_from_hex(private_key)?;
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| WalletError::DerivationFailure(format!("Signing failed: {}", e)))?;
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(format!("0x{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_classify() {
        assert_eq!(classify(PHRASE), WalletKind::Mnemonic);
        assert_eq!(classify(&format!("  {}  ", PHRASE.to_uppercase())), WalletKind::Mnemonic);
        assert_eq!(
            classify("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"),
            WalletKind::PrivateKey
        );
        assert_eq!(
            classify("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"),
            WalletKind::PrivateKey
        );
        assert_eq!(
            classify("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            WalletKind::ReadOnly
        );
        // bad checksum word
        assert_eq!(
            classify("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"),
            WalletKind::Seed
        );
        assert_eq!(classify("000102030405060708090a0b0c0d0e0f"), WalletKind::Seed);
    }

    #[test]
    fn test_mnemonic_reference_account() {
        let account = derive_from_mnemonic(PHRASE, 0).unwrap();
        assert_eq!(
            account.address.to_string(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn test_mnemonic_derivation_is_deterministic_per_index() {
        let first = derive_from_mnemonic(PHRASE, 3).unwrap();
        let again = derive_from_mnemonic(PHRASE, 3).unwrap();
        assert_eq!(first.address, again.address);
        assert_eq!(first.private_key, again.private_key);

        let addresses: std::collections::HashSet<_> = (0..8)
            .map(|i| derive_from_mnemonic(PHRASE, i).unwrap().address)
            .collect();
        assert_eq!(addresses.len(), 8);
    }

    #[test]
    fn test_private_key_identity() {
        let account = derive_from_private_key(
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap();
        assert_eq!(
            account.private_key.expose(),
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
        );
        assert_eq!(
            account.address.to_string(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
    }

    #[test]
    fn test_seed_bytes_match_root_index_zero() {
        let seed = "000102030405060708090a0b0c0d0e0f";
        let account = derive_from_seed_bytes(seed).unwrap();
        let root = HdRoot::from_seed_hex(&format!("0x{}", seed)).unwrap();
        assert_eq!(root.derive_account(0).unwrap().address, account.address);
        assert!(derive_from_seed_bytes("0011").is_err());
        assert!(derive_from_seed_bytes("not hex at all").is_err());
    }

    #[test]
    fn test_derive_from_input() {
        let hd = derive_from_input(PHRASE).unwrap();
        assert_eq!(hd.kind, WalletKind::Mnemonic);
        assert!(hd.is_hd());
        assert_eq!(hd.address, derive_from_mnemonic(PHRASE, 0).unwrap().address);

        let watch = derive_from_input("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        assert_eq!(watch.kind, WalletKind::ReadOnly);
        assert!(watch.private_key.is_none());
        assert!(!watch.is_hd());

        assert!(matches!(
            derive_from_input("definitely not a wallet"),
            Err(WalletError::DerivationFailure(_))
        ));
    }

    #[test]
    fn test_generated_mnemonic_is_valid() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.expose().split(' ').count(), 12);
        assert_eq!(classify(phrase.expose()), WalletKind::Mnemonic);
        assert_ne!(phrase, generate_mnemonic().unwrap());
    }

    #[test]
    fn test_signature_recovers_signer() {
        let account = derive_from_mnemonic(PHRASE, 0).unwrap();
        let digest = crate::address::keccak256(b"hello");
        let signature = sign_digest(account.private_key.expose(), &digest).unwrap();

        let bytes = hex::decode(&signature[2..]).unwrap();
        assert_eq!(bytes.len(), 65);
        let sig = Signature::from_slice(&bytes[..64]).unwrap();
        let recid = RecoveryId::from_byte(bytes[64] - 27).unwrap();
        let recovered = VerifyingKey::recover_from_prehash(&digest, &sig, recid).unwrap();
        assert_eq!(Address::from_verifying_key(&recovered), account.address);
    }
}

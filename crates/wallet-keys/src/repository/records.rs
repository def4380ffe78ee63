//! Versioned envelopes stored in the secret store

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::address::Address;
use crate::model::{Wallet, WalletCollection};

pub const PRIVATE_KEY_VERSION: f64 = 1.0;
pub const SEED_PHRASE_VERSION: f64 = 1.0;
pub const SELECTED_WALLET_VERSION: f64 = 1.0;
pub const ALL_WALLETS_VERSION: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllWalletsData {
    pub version: f64,
    pub wallets: WalletCollection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedWalletData {
    pub version: f64,
    pub wallet: Wallet,
}

/// `private_key` is PIN ciphertext on devices without biometrics
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyData {
    #[zeroize(skip)]
    pub address: Address,
    pub private_key: String,
    pub version: f64,
}

/// `seedphrase` holds the wallet's original input: mnemonic, raw seed or
/// private key. PIN ciphertext on devices without biometrics.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SeedPhraseData {
    pub id: String,
    pub seedphrase: String,
    pub version: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_wire_format() {
        let record = PrivateKeyData {
            address: Address::from_bytes([0xab; 20]),
            private_key: "0x01".to_string(),
            version: PRIVATE_KEY_VERSION,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["privateKey"], "0x01");
        assert_eq!(json["version"], 1.0);
        assert!(json["address"].as_str().unwrap().starts_with("0x"));
    }

    #[test]
    fn test_secret_envelopes_zeroize() {
        let mut seed = SeedPhraseData {
            id: "wallet_1".to_string(),
            seedphrase: "abandon about".to_string(),
            version: SEED_PHRASE_VERSION,
        };
        seed.zeroize();
        assert!(seed.seedphrase.is_empty());
        assert!(seed.id.is_empty());

        let mut key = PrivateKeyData {
            address: Address::from_bytes([0xab; 20]),
            private_key: "0x01".to_string(),
            version: PRIVATE_KEY_VERSION,
        };
        key.zeroize();
        assert!(key.private_key.is_empty());
        assert_eq!(key.address, Address::from_bytes([0xab; 20]));
    }
}

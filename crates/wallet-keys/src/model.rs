//! Wallet and account read model shared with the UI layer

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::derive::WalletKind;

pub const DEFAULT_WALLET_NAME: &str = "My Wallet";

/// All wallets keyed by id, in insertion order
pub type WalletCollection = IndexMap<String, Wallet>;

/// One derived or imported account inside a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub index: u32,
    #[serde(default)]
    pub label: String,
    pub address: Address,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub visible: bool,
}

impl Account {
    pub fn new(index: u32, address: Address, color: u32, label: impl Into<String>) -> Self {
        Self {
            index,
            label: label.into(),
            address,
            color,
            avatar: None,
            image: None,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Cloud,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WalletKind,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub backed_up: bool,
    /// Unix millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_type: Option<BackupType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_file: Option<String>,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    pub addresses: Vec<Account>,
    /// Secret records missing from the store
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub damaged: bool,
}

impl Wallet {
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.addresses.iter().find(|a| a.address == *address)
    }

    pub fn account_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.addresses.iter_mut().find(|a| a.address == *address)
    }

    pub fn has_visible_account(&self, address: &Address) -> bool {
        self.account(address).is_some_and(|a| a.visible)
    }

    pub fn first_visible_account(&self) -> Option<&Account> {
        self.addresses.iter().find(|a| a.visible)
    }

    /// Index the next derived account should use
    pub fn next_account_index(&self) -> u32 {
        self.addresses
            .iter()
            .map(|a| a.index)
            .max()
            .map_or(0, |max| max + 1)
    }
}

/// Changes applied by rename, recolour and hide/unhide
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub label: Option<String>,
    pub color: Option<u32>,
    pub visible: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn wallet() -> Wallet {
        Wallet {
            id: "wallet_1".to_string(),
            kind: WalletKind::Mnemonic,
            imported: false,
            primary: true,
            backed_up: false,
            backup_date: None,
            backup_type: None,
            backup_file: None,
            name: DEFAULT_WALLET_NAME.to_string(),
            color: 0,
            addresses: vec![
                Account::new(0, address(1), 3, ""),
                Account {
                    visible: false,
                    ..Account::new(4, address(2), 5, "old")
                },
            ],
            damaged: false,
        }
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(wallet()).unwrap();
        assert_eq!(json["type"], "mnemonic");
        assert_eq!(json["backedUp"], false);
        assert!(json.get("damaged").is_none());
        assert!(json.get("backupDate").is_none());
        assert_eq!(json["addresses"][1]["visible"], false);
    }

    #[test]
    fn test_legacy_record_without_optional_fields() {
        let json = r#"{
            "id": "wallet_1",
            "type": "readOnly",
            "name": "Watched",
            "addresses": [{"index": 0, "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed", "visible": true}]
        }"#;
        let wallet: Wallet = serde_json::from_str(json).unwrap();
        assert_eq!(wallet.kind, WalletKind::ReadOnly);
        assert!(!wallet.primary && !wallet.imported && !wallet.damaged);
        assert_eq!(wallet.addresses[0].label, "");
    }

    #[test]
    fn test_account_lookup() {
        let wallet = wallet();
        assert!(wallet.has_visible_account(&address(1)));
        assert!(!wallet.has_visible_account(&address(2)));
        assert!(wallet.account(&address(2)).is_some());
        assert_eq!(wallet.next_account_index(), 5);
        assert_eq!(wallet.first_visible_account().unwrap().index, 0);
    }
}

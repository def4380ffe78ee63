//! Ethereum addresses with EIP-55 checksum rendering

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::error::{Result, WalletError};

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// 20-byte account address. Equality is by bytes, so casing never matters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Address owning a secp256k1 public key: last 20 bytes of
    /// keccak256 over the uncompressed point without its 0x04 tag.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// EIP-55 mixed-case form
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    pub fn to_lowercase_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// True for `0x` + 40 hex chars whose casing, when mixed, is a valid checksum
    pub fn is_valid(s: &str) -> bool {
        s.parse::<Address>().is_ok()
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| WalletError::DerivationFailure(format!("Address without 0x prefix: {}", s)))?;
        if body.len() != 40 {
            return Err(WalletError::DerivationFailure(format!(
                "Address must be 40 hex characters, got {}",
                body.len()
            )));
        }
        let decoded = hex::decode(body)
            .map_err(|e| WalletError::DerivationFailure(format!("Invalid address hex: {}", e)))?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded);
        let address = Self(bytes);

        let mixed_case = body.chars().any(|c| c.is_ascii_lowercase())
            && body.chars().any(|c| c.is_ascii_uppercase());
        if mixed_case && address.to_checksum()[2..] != *body {
            return Err(WalletError::DerivationFailure(format!(
                "Address checksum mismatch: {}",
                s
            )));
        }
        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // EIP-55 reference vectors
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for s in CHECKSUMMED {
            let address: Address = s.parse().unwrap();
            assert_eq!(address.to_checksum(), s);
            assert_eq!(address.to_string(), s);
        }
    }

    #[test]
    fn test_single_case_accepted() {
        let lower: Address = CHECKSUMMED[0].to_lowercase().parse().unwrap();
        let checksummed: Address = CHECKSUMMED[0].parse().unwrap();
        assert_eq!(lower, checksummed);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert!(!Address::is_valid("0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!Address::is_valid("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!Address::is_valid("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeA"));
    }

    #[test]
    fn test_serde_uses_checksum() {
        let address: Address = CHECKSUMMED[1].to_lowercase().parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[1]));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}

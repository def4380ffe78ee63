//! Names of the entries the wallet keeps in the secret store

pub const ADDRESS: &str = "address";
pub const ALL_WALLETS: &str = "allWallets";
pub const SELECTED_WALLET: &str = "selectedWallet";
pub const OLD_SEED_PHRASE_MIGRATED: &str = "oldSeedPhraseMigrated";
pub const PIN: &str = "pin";
/// Pre-multiwallet single seed phrase entry
pub const SEED_PHRASE: &str = "seedPhrase";
pub const PRIVATE_KEY: &str = "privateKey";

/// `{owner}_{kind}` where owner is a wallet id or an address
pub fn secret_key(owner: &str, kind: &str) -> String {
    format!("{}_{}", owner, kind)
}

pub fn seed_phrase_key(wallet_id: &str) -> String {
    secret_key(wallet_id, SEED_PHRASE)
}

pub fn private_key_key(address: &crate::Address) -> String {
    secret_key(&address.to_checksum(), PRIVATE_KEY)
}

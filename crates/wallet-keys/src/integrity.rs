//! Keychain integrity check
//!
//! Verifies that every wallet holding secrets still has its seed record
//! and one private-key record per account. Wallets missing any of them are
//! flagged `damaged` so the UI can ask for a re-import. The check itself
//! never fails a wallet operation.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::local::INTEGRITY_DONE;
use crate::model::Wallet;
use crate::repository::WalletRepository;
use crate::storage::keys;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// No damaged wallets and a stored address
    pub healthy: bool,
    pub has_address: bool,
    /// Ids flagged during this check
    pub damaged: Vec<String>,
}

pub struct IntegrityChecker<'a> {
    repo: &'a WalletRepository,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(repo: &'a WalletRepository) -> Self {
        Self { repo }
    }

    /// Run the check. The integrity status is recorded as done even when
    /// the check errors out.
    pub async fn check(&self) -> Result<IntegrityReport> {
        let result = self.inspect().await;
        let recorded = self
            .repo
            .local()
            .save_keychain_integrity_state(INTEGRITY_DONE)
            .await;

        let report = result?;
        recorded?;
        if report.healthy {
            info!("Keychain integrity check passed");
        } else {
            warn!("Keychain integrity check found problems: {:?}", report);
        }
        Ok(report)
    }

    async fn has_all_secrets(&self, wallet: &Wallet) -> Result<bool> {
        let store = self.repo.store();
        let mut healthy = true;

        if !store.has_key(&keys::seed_phrase_key(&wallet.id)).await? {
            warn!("Wallet {} is missing its seed record", wallet.id);
            healthy = false;
        }
        for account in &wallet.addresses {
            if !store.has_key(&keys::private_key_key(&account.address)).await? {
                warn!("Wallet {} is missing the private key of {}", wallet.id, account.address);
                healthy = false;
            }
        }
        Ok(healthy)
    }

    async fn inspect(&self) -> Result<IntegrityReport> {
        let store = self.repo.store();

        let has_address = store.has_key(keys::ADDRESS).await?;
        if !has_address {
            warn!("No selected address in the secret store");
        }
        let migrated = store.has_key(keys::OLD_SEED_PHRASE_MIGRATED).await?;
        let legacy_seed = store.has_key(keys::SEED_PHRASE).await?;
        debug!("Secrets migrated: {}, legacy seed present: {}", migrated, legacy_seed);

        let Some(mut wallets) = self.repo.get_all_wallets().await? else {
            warn!("No wallet collection to check");
            return Ok(IntegrityReport {
                healthy: has_address,
                has_address,
                damaged: Vec::new(),
            });
        };

        let mut damaged = Vec::new();
        for wallet in wallets.values().filter(|w| !w.kind.is_read_only()) {
            let mut healthy = self.has_all_secrets(wallet).await?;

            // created before the per-wallet format and not migrated yet
            if !wallet.imported && !migrated && legacy_seed {
                healthy = true;
            }
            if !healthy {
                damaged.push(wallet.id.clone());
            }
        }

        if !damaged.is_empty() {
            for id in &damaged {
                if let Some(wallet) = wallets.get_mut(id) {
                    wallet.damaged = true;
                }
            }
            self.repo.update_wallets(&wallets).await?;
        }

        Ok(IntegrityReport {
            healthy: has_address && damaged.is_empty(),
            has_address,
            damaged,
        })
    }
}

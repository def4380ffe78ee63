//! Gap-terminated account discovery for imported HD wallets
//!
//! Index 0 is the wallet's primary account, so probing starts at 1. Each
//! `step` derives one child, asks the oracle about it and either yields the
//! account or finishes. The first index without history ends the scan.

use std::time::Duration;

use tracing::{debug, warn};

use crate::derive::{DerivedAccount, HdRoot};
use crate::error::Result;
use crate::history::TransactionHistory;

#[derive(Debug, Clone)]
pub struct DiscoveredAccount {
    pub index: u32,
    pub account: DerivedAccount,
}

#[derive(Debug)]
pub struct AccountDiscovery {
    index: u32,
    found: Vec<DiscoveredAccount>,
    done: bool,
    timeout: Duration,
}

impl AccountDiscovery {
    /// `timeout` bounds each oracle call
    pub fn new(timeout: Duration) -> Self {
        Self {
            index: 1,
            found: Vec::new(),
            done: false,
            timeout,
        }
    }

    /// Next index to probe
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn found(&self) -> &[DiscoveredAccount] {
        &self.found
    }

    /// Oracle errors and timeouts count as "no history"
    async fn has_history(&self, oracle: &dyn TransactionHistory, account: &DerivedAccount) -> bool {
        match tokio::time::timeout(self.timeout, oracle.has_previous_transactions(&account.address)).await {
            Ok(Ok(has_history)) => has_history,
            Ok(Err(e)) => {
                warn!(
                    "History lookup for {} failed, stopping discovery: {}",
                    account.address, e
                );
                false
            }
            Err(_) => {
                warn!(
                    "History lookup for {} timed out after {:?}, stopping discovery",
                    account.address, self.timeout
                );
                false
            }
        }
    }

    /// Probe the current index. Returns the account when it has history.
    pub async fn step(
        &mut self,
        root: &HdRoot,
        oracle: &dyn TransactionHistory,
    ) -> Result<Option<DiscoveredAccount>> {
        if self.done {
            return Ok(None);
        }

        let account = match root.derive_account(self.index) {
            Ok(account) => account,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        if !self.has_history(oracle, &account).await {
            debug!("No history at index {}, discovery finished", self.index);
            self.done = true;
            return Ok(None);
        }

        let discovered = DiscoveredAccount {
            index: self.index,
            account,
        };
        debug!("Discovered account {} at index {}", discovered.account.address, self.index);
        self.found.push(discovered.clone());
        self.index += 1;
        Ok(Some(discovered))
    }

    /// Drive the scan to completion without per-account side effects
    pub async fn run(
        mut self,
        root: &HdRoot,
        oracle: &dyn TransactionHistory,
    ) -> Result<Vec<DiscoveredAccount>> {
        while self.step(root, oracle).await?.is_some() {}
        Ok(self.found)
    }
}

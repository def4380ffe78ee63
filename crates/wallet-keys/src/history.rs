//! Transaction-history oracle used by account discovery

use async_trait::async_trait;

use crate::address::Address;
use crate::error::Result;

#[async_trait]
pub trait TransactionHistory: Send + Sync {
    /// Whether `address` has ever sent or received a transaction
    async fn has_previous_transactions(&self, address: &Address) -> Result<bool>;
}

/// Oracle for offline use: nothing has history, so discovery stops at once
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

#[async_trait]
impl TransactionHistory for NoHistory {
    async fn has_previous_transactions(&self, _address: &Address) -> Result<bool> {
        Ok(false)
    }
}

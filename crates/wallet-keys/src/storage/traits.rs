//! Storage trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who may read an entry back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessPolicy {
    /// Readable without user interaction, never synced off the device
    AlwaysThisDeviceOnly,
    /// Requires the user to be present; gated by biometrics when `biometric`
    /// is set, otherwise by the device passcode
    UserPresence { biometric: bool },
}

impl AccessPolicy {
    pub fn requires_user(&self) -> bool {
        matches!(self, Self::UserPresence { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Shown by the OS when the read needs the user to authenticate
    pub authentication_prompt: Option<String>,
}

impl LoadOptions {
    pub fn prompt(message: impl Into<String>) -> Self {
        Self {
            authentication_prompt: Some(message.into()),
        }
    }
}

/// Trait for secure storage backends
///
/// `retrieve` returns `Ok(None)` for a missing entry and
/// `Err(WalletError::InsufficientAuth)` when the entry exists but the
/// configured authentication factor is not accepted.
#[async_trait]
pub trait SecureStorage: Send + Sync {
    async fn store(&self, key: &str, value: &[u8], policy: AccessPolicy) -> Result<()>;

    async fn retrieve(&self, key: &str, options: &LoadOptions) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Never prompts the user
    async fn exists(&self, key: &str) -> Result<bool>;

    fn is_hardware_backed(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}

//! User authentication collaborator
//!
//! On devices without biometric gating secrets are PIN-encrypted before
//! they reach the store. The authenticator supplies that PIN.

use async_trait::async_trait;

use crate::error::{Result, WalletError};

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether the store can gate private entries behind biometrics
    fn supports_biometrics(&self) -> bool;

    /// PIN already configured on this device, if any
    async fn existing_pin(&self) -> Result<Option<String>>;

    /// Prompt for the PIN. Dismissing the prompt yields `AuthCancelled`.
    async fn authenticate_with_pin(&self) -> Result<String>;
}

/// Device whose secure store enforces biometrics; never asks for a PIN
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustedDevice;

#[async_trait]
impl Authenticator for TrustedDevice {
    fn supports_biometrics(&self) -> bool {
        true
    }

    async fn existing_pin(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn authenticate_with_pin(&self) -> Result<String> {
        Err(WalletError::AuthenticationRequired)
    }
}

/// PIN-only device with a PIN supplied up front, e.g. from the CLI.
/// `None` behaves like a user dismissing every prompt.
#[derive(Debug, Clone)]
pub struct FixedPin {
    pin: Option<String>,
}

impl FixedPin {
    pub fn new(pin: Option<String>) -> Self {
        Self { pin }
    }
}

#[async_trait]
impl Authenticator for FixedPin {
    fn supports_biometrics(&self) -> bool {
        false
    }

    async fn existing_pin(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn authenticate_with_pin(&self) -> Result<String> {
        self.pin.clone().ok_or(WalletError::AuthCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_pin() {
        let auth = FixedPin::new(Some("1234".to_string()));
        assert!(!auth.supports_biometrics());
        assert_eq!(auth.authenticate_with_pin().await.unwrap(), "1234");

        let cancelled = FixedPin::new(None);
        assert!(matches!(
            cancelled.authenticate_with_pin().await,
            Err(WalletError::AuthCancelled)
        ));
    }
}

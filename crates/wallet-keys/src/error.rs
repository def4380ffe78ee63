//! Error types for wallet-keys

use thiserror::Error;

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;

/// Wallet error types
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Looks like you already imported this wallet")]
    DuplicateImport,

    #[error("Authentication required to access wallet secrets")]
    AuthenticationRequired,

    #[error("Authentication was cancelled")]
    AuthCancelled,

    #[error(
        "Your current authentication method is not secure enough - enable an alternative biometric method"
    )]
    InsufficientAuth,

    #[error("Derivation failed: {0}")]
    DerivationFailure(String),

    #[error("Secret store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store is locked - unlock with the store passphrase first")]
    StoreLocked,

    #[error("Invalid passphrase")]
    InvalidPassphrase,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Decryption failed: {0}")]
    DecryptionError(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Migration v{version} failed: {source}")]
    MigrationStepFailure {
        version: usize,
        #[source]
        source: Box<WalletError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl WalletError {
    /// Whether the error came from the user declining or failing authentication
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired | Self::AuthCancelled | Self::InsufficientAuth
        )
    }
}

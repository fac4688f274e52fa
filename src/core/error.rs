//! Wallet errors - one variant per failure kind callers can match on

use thiserror::Error;

/// Shown when an operation needs the provider and none was detected
pub const NOT_INSTALLED_MESSAGE: &str = "MetaMask is not installed. Please install MetaMask to continue.";

/// Connect error shown when the provider rejected without a message
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to MetaMask";

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

/// Wallet errors. None of them is fatal; the shared session is never touched
/// by a failing operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Precondition failure, the provider was never called
    #[error("{}", NOT_INSTALLED_MESSAGE)]
    ProviderNotInstalled,
    #[error("User rejected the request: {0}")]
    UserRejected(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl WalletError {
    /// Stable kind name, used by the JS bridge and the demo CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            WalletError::ProviderNotInstalled => "ProviderNotInstalled",
            WalletError::UserRejected(_) => "UserRejected",
            WalletError::ProviderError(_) => "ProviderError",
            WalletError::SigningFailed(_) => "SigningFailed",
            WalletError::TransactionFailed(_) => "TransactionFailed",
        }
    }

    /// The underlying message without the kind prefix
    pub fn reason(&self) -> &str {
        match self {
            WalletError::ProviderNotInstalled => NOT_INSTALLED_MESSAGE,
            WalletError::UserRejected(m)
            | WalletError::ProviderError(m)
            | WalletError::SigningFailed(m)
            | WalletError::TransactionFailed(m) => m,
        }
    }
}

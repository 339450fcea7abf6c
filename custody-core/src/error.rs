//! Error types for the custody-core library

use thiserror::Error;

/// Custom error type for custody-core operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid typed data: {0}")]
    InvalidTypedData(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Too many failed attempts, retry in {retry_after_secs}s")]
    LockedOut { retry_after_secs: u64 },

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("SessionManager not initialized")]
    NotInitialized,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error category the UI layer branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad mnemonic, malformed params or typed data
    Validation,
    /// Wrong PIN, biometric denial, missing seed, lockout
    Authentication,
    /// Unknown method or chain
    UnsupportedOperation,
    /// Session manager used before `initialize()`
    NotInitialized,
    /// Relay or RPC failure
    Transport,
    /// Keystore or blob store failure
    Storage,
    /// Derivation, signing or encoding failure
    Internal,
}

impl Error {
    /// Map the error onto its taxonomy category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidTypedData(_) => ErrorKind::Validation,
            Self::Authentication(_) | Self::LockedOut { .. } => ErrorKind::Authentication,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Storage(_) => ErrorKind::Storage,
            Self::KeyDerivation(_) | Self::Signing(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn unsupported_chain(chain_id: u64) -> Self {
        Self::UnsupportedOperation(format!("Unsupported chain: {}", chain_id))
    }

    pub(crate) fn unsupported_method(method: &str) -> Self {
        Self::UnsupportedOperation(format!("Unsupported method: {}", method))
    }

    pub(crate) fn missing_mnemonic() -> Self {
        Self::Authentication("Failed to retrieve mnemonic".to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for custody-core operations
pub type Result<T> = std::result::Result<T, Error>;

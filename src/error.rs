//! Error types for the wallet manager

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A local precondition failed; no network call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Signing error: {0}")]
    Signing(String),

    /// Transport-level failure (unreachable, timeout, undecodable response).
    #[error("Network error: {0}")]
    Network(String),

    /// The ledger answered with `success: false`.
    #[error("Ledger error: {0}")]
    Service(String),

    /// Operation invoked in the wrong transfer state.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Persisted wallet data is corrupted: {0}")]
    PersistenceCorruption(String),

    #[error("Wallet not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Only transport failures are worth retrying, and only for idempotent calls.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Network(format!("request timed out: {}", err))
        } else {
            Error::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

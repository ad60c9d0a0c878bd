//! Error types for Teller core operations.
//!
//! This module defines the error hierarchy for all core operations.
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-friendly messages and exit codes.

use thiserror::Error;

/// Result type alias for Teller operations.
pub type Result<T> = std::result::Result<T, TellerError>;

/// Core error type for Teller operations.
#[derive(Debug, Error)]
pub enum TellerError {
    /// Incorrect store passphrase during decryption
    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    /// Store file not found
    #[error("Store file not found")]
    StoreNotFound,

    /// Encryption, decryption, or key derivation error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The OS secure random source failed. Fatal for hashing: there is
    /// no fallback to a weaker source.
    #[error("Secure random source unavailable: {0}")]
    EntropySource(String),

    /// A stored credential blob does not have the expected length.
    /// Data-integrity problem, not a wrong-password outcome.
    #[error("Malformed credential secret: expected {expected} bytes, found {found}")]
    MalformedSecret { expected: usize, found: usize },

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// Account not found by id
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// Account id already taken
    #[error("Account already exists: {0}")]
    AccountExists(i64),

    /// A password-change candidate matched a previously stored credential
    #[error("Password has already been used for this account")]
    PasswordReused,

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

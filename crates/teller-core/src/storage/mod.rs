//! Storage abstraction for Teller.
//!
//! This module defines the `AccountStore` trait and core types for
//! interacting with encrypted account storage.
//!
//! ## Architecture
//!
//! The storage layer is backend-agnostic; the default backend is an
//! age-encrypted SQLite database held in memory while open and serialized
//! to a single encrypted file on close.
//!
//! ## Security
//!
//! Storage engines are responsible for:
//! - Encryption at rest (no plaintext modes)
//! - Atomic writes to prevent corruption
//! - Enforcing the fixed credential blob length at the boundary

pub mod age_sqlite;
pub mod encryption;
pub mod traits;
pub mod types;

// Re-export public types
pub use age_sqlite::AgeSqliteStore;
pub use traits::AccountStore;
pub use types::{
    Account, AccountPatch, AccountType, AccountUpdate, Credential, NewAccount, StoreMetadata,
};

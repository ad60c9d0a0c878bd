//! # Teller Core
//!
//! Core library for Teller - an encrypted account and credential store.
//!
//! This crate provides the domain logic, storage abstractions, and data
//! models independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **crypto**: Argon2id credential hashing and passphrase rules
//! - **storage**: Account store trait and the age-encrypted SQLite backend
//! - **service**: Account operations that tie hashing to storage
//! - **validation**: Contact field validation

pub mod crypto;
pub mod error;
pub mod service;
pub mod storage;
pub mod validation;

pub use crypto::{CredentialHasher, HashParams};
pub use error::{Result, TellerError};
pub use service::AccountService;
pub use storage::{AccountStore, AgeSqliteStore};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

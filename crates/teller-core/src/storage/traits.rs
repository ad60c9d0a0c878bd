//! Storage engine trait definition.
//!
//! The `AccountStore` trait defines the interface that storage backends
//! must implement. This abstraction keeps the service layer independent of
//! how account and credential rows are persisted.

use std::path::Path;
use uuid::Uuid;

use super::types::{Account, AccountPatch, AccountUpdate, Credential, NewAccount, StoreMetadata};
use crate::error::Result;

/// Storage interface for encrypted account storage.
///
/// All implementations must ensure:
/// - Data is encrypted at rest
/// - Account and credential writes are atomic where possible
/// - Credentials are append-only and cascade-deleted with their account
/// - Stored credential secrets have the fixed expected length
pub trait AccountStore: Send + Sync {
    /// Create a new store at the specified path.
    ///
    /// Returns the store id.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::Storage` if the file already exists or cannot
    /// be written.
    fn create(path: &Path, passphrase: &str) -> Result<Uuid>
    where
        Self: Sized;

    /// Open an existing store.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::StoreNotFound` if the file is missing and
    /// `TellerError::IncorrectPassphrase` if decryption fails.
    fn open(path: &Path, passphrase: &str) -> Result<Self>
    where
        Self: Sized;

    /// Close the store, persisting all changes atomically.
    ///
    /// After calling this method the store instance is consumed.
    fn close(self) -> Result<()>;

    /// Get store metadata.
    fn metadata(&self) -> Result<StoreMetadata>;

    // --- Account operations ---

    /// Insert a new account together with its initial credential secret,
    /// in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::AccountExists` if the id is taken and
    /// `TellerError::MalformedSecret` if the secret has the wrong length.
    fn insert_account(&mut self, account: &NewAccount, secret: &[u8]) -> Result<()>;

    /// Get an account by id.
    ///
    /// Returns `Ok(None)` if not found.
    fn get_account(&self, id: i64) -> Result<Option<Account>>;

    /// List all accounts, ordered by id.
    fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Replace an account's mutable fields. Credentials are untouched.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::AccountNotFound` if the id is unknown.
    fn update_account(&mut self, id: i64, update: &AccountUpdate) -> Result<()>;

    /// Apply a partial update. Only fields present in the patch change.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::AccountNotFound` if the id is unknown and
    /// `TellerError::InvalidInput` if the patch is empty.
    fn patch_account(&mut self, id: i64, patch: &AccountPatch) -> Result<()>;

    /// Delete an account and, through cascade, all of its credentials.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::AccountNotFound` if the id is unknown.
    fn delete_account(&mut self, id: i64) -> Result<()>;

    // --- Credential operations ---

    /// Append a new credential secret for an account. Existing rows are
    /// never modified; the newest row becomes the current credential.
    fn append_credential(&mut self, account_id: i64, secret: &[u8]) -> Result<()>;

    /// Get the account's current (most recent) credential.
    ///
    /// Returns `Ok(None)` if the account has no credential rows.
    fn current_credential(&self, account_id: i64) -> Result<Option<Credential>>;

    /// List every credential stored for an account, newest first.
    fn credential_history(&self, account_id: i64) -> Result<Vec<Credential>>;

    // --- Maintenance operations ---

    /// Check store integrity.
    ///
    /// Verifies foreign-key consistency, credential blob lengths, that
    /// every account has at least one credential, and that required
    /// metadata keys are present.
    fn check_integrity(&self) -> Result<()>;
}

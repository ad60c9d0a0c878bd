//! Account service: ties credential hashing to account storage.
//!
//! The service owns a store and a [`CredentialHasher`] and is the only
//! place where plaintext passwords meet stored secrets. Callers above this
//! layer only ever see accounts, booleans, and errors.

use tracing::{info, warn};

use crate::crypto::CredentialHasher;
use crate::error::{Result, TellerError};
use crate::storage::traits::AccountStore;
use crate::storage::types::{Account, AccountPatch, AccountUpdate, NewAccount};

/// Minimum account password length in characters.
const MIN_PASSWORD_LENGTH: usize = 8;

fn validate_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(TellerError::InvalidInput(
            "Password cannot be empty".to_string(),
        ));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(TellerError::InvalidInput(format!(
            "Password must be at least {} characters (got {})",
            MIN_PASSWORD_LENGTH,
            password.len()
        )));
    }
    Ok(())
}

/// High-level account and credential operations over any [`AccountStore`].
pub struct AccountService<S: AccountStore> {
    store: S,
    hasher: CredentialHasher,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: S, hasher: CredentialHasher) -> Self {
        Self { store, hasher }
    }

    /// Consume the service and return the underlying store, e.g. to close it.
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account and its initial credential in one transaction.
    ///
    /// # Errors
    ///
    /// - `TellerError::Validation` / `InvalidInput` for bad contact fields
    ///   or a password below policy
    /// - `TellerError::AccountExists` if the id is taken
    pub fn create_account(&mut self, account: &NewAccount, password: &str) -> Result<()> {
        account.validate()?;
        validate_password(password)?;

        if self.store.get_account(account.id)?.is_some() {
            return Err(TellerError::AccountExists(account.id));
        }

        let secret = self.hasher.hash(password)?;
        self.store.insert_account(account, &secret)?;

        info!(account_id = account.id, "account created");
        Ok(())
    }

    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        self.store.get_account(id)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.store.list_accounts()
    }

    pub fn update_account(&mut self, id: i64, update: &AccountUpdate) -> Result<()> {
        update.validate()?;
        self.store.update_account(id, update)
    }

    pub fn patch_account(&mut self, id: i64, patch: &AccountPatch) -> Result<()> {
        self.store.patch_account(id, patch)
    }

    pub fn delete_account(&mut self, id: i64) -> Result<()> {
        self.store.delete_account(id)?;
        info!(account_id = id, "account deleted");
        Ok(())
    }

    /// Verify a password attempt against the account's current credential.
    ///
    /// Returns `Ok(false)` uniformly for an unknown account, an account
    /// without credentials, and a wrong password, so callers cannot leak
    /// which of those occurred. A malformed stored secret propagates as an
    /// error: that is an operator problem, not a login outcome.
    pub fn authenticate(&self, id: i64, password: &str) -> Result<bool> {
        let credential = match self.store.current_credential(id)? {
            Some(credential) => credential,
            None => return Ok(false),
        };

        match self.hasher.verify(password, &credential.secret) {
            Ok(matched) => Ok(matched),
            Err(err @ TellerError::MalformedSecret { .. }) => {
                warn!(
                    account_id = id,
                    credential_id = credential.id,
                    "stored credential is malformed"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Change an account's password by appending a new credential.
    ///
    /// The candidate is verified against every stored credential for the
    /// account; any match rejects it as reused. Comparing freshly hashed
    /// blobs for equality can never work (each hash carries a fresh salt),
    /// so reuse detection must go through `verify`.
    pub fn change_password(&mut self, id: i64, new_password: &str) -> Result<()> {
        validate_password(new_password)?;

        if self.store.get_account(id)?.is_none() {
            return Err(TellerError::AccountNotFound(id));
        }

        for credential in self.store.credential_history(id)? {
            if self.hasher.verify(new_password, &credential.secret)? {
                return Err(TellerError::PasswordReused);
            }
        }

        let secret = self.hasher.hash(new_password)?;
        self.store.append_credential(id, &secret)?;

        info!(account_id = id, "credential appended");
        Ok(())
    }
}

//! Age encryption/decryption utilities.
//!
//! Wrappers around the Age encryption library for encrypting the serialized
//! store with passphrase-based encryption. Age uses scrypt internally for
//! its passphrase recipients; the account-credential hashing in
//! [`crate::crypto`] is a separate concern with its own Argon2id parameters.

use std::io::{Read, Write};
use std::iter;

use age::secrecy::SecretString;

use crate::error::{Result, TellerError};

/// Encrypt data using Age passphrase-based encryption.
///
/// Returns encrypted bytes suitable for writing to disk.
pub fn encrypt(data: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| TellerError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    writer
        .write_all(data)
        .map_err(|e| TellerError::Crypto(format!("Encryption write failed: {}", e)))?;

    writer
        .finish()
        .map_err(|e| TellerError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

/// Decrypt data using Age passphrase-based encryption.
///
/// # Errors
///
/// Returns `TellerError::IncorrectPassphrase` when the passphrase does not
/// match, and `TellerError::Crypto` for corrupted data or other failures.
pub fn decrypt(encrypted_data: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(encrypted_data)
        .map_err(|e| TellerError::Crypto(format!("Failed to create decryptor: {}", e)))?;

    let mut decrypted = Vec::new();

    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => TellerError::IncorrectPassphrase,
            _ => TellerError::Crypto(format!("Decryption failed: {}", e)),
        })?;

    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| TellerError::Crypto(format!("Failed to read decrypted data: {}", e)))?;

    Ok(decrypted)
}

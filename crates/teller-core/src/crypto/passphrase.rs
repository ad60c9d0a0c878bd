//! Store passphrase validation.
//!
//! Enforces minimum security requirements for the passphrase that encrypts
//! the store file. Account password policy lives with the service layer.

use crate::error::{Result, TellerError};

/// Minimum passphrase length in characters.
const MIN_PASSPHRASE_LENGTH: usize = 8;

/// Validate that a store passphrase meets minimum security requirements.
///
/// # Requirements
///
/// - At least 8 characters long
/// - Not empty or only whitespace
///
/// # Errors
///
/// Returns `TellerError::InvalidInput` with an explanation.
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    if passphrase.trim().is_empty() {
        return Err(TellerError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(TellerError::InvalidInput(format!(
            "Passphrase must be at least {} characters (got {})",
            MIN_PASSPHRASE_LENGTH,
            passphrase.len()
        )));
    }

    Ok(())
}

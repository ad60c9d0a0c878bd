//! Contact information validation.
//!
//! Email and phone checks applied when accounts are created or updated.
//! Both checks return the same error style so callers see one taxonomy.

use crate::error::{Result, TellerError};

/// Email domains accepted for account contact addresses.
const EMAIL_DOMAIN_WHITELIST: [&str; 5] = [
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
];

/// Accepted phone country codes.
const PHONE_COUNTRY_CODES: [&str; 5] = [
    "+31", // Netherlands
    "+1",  // USA/Canada
    "+44", // UK
    "+49", // Germany
    "+33", // France
];

/// Validate an email address.
///
/// The address must be non-empty, contain `@` and `.`, and use a
/// whitelisted domain.
pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(TellerError::Validation(
            "Email address cannot be empty".to_string(),
        ));
    }

    if !email.contains('@') || !email.contains('.') {
        return Err(TellerError::Validation(
            "Email address must contain '@' and '.' characters".to_string(),
        ));
    }

    let domain = email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .unwrap_or_default();
    if !EMAIL_DOMAIN_WHITELIST.contains(&domain) {
        return Err(TellerError::Validation(format!(
            "Email domain is not whitelisted: {}",
            domain
        )));
    }

    Ok(())
}

/// Validate a phone number.
///
/// The number must be non-empty and start with a whitelisted country code
/// followed by a space, e.g. `+31 612345678`.
pub fn validate_phone_number(phone_number: &str) -> Result<()> {
    if phone_number.is_empty() {
        return Err(TellerError::Validation(
            "Phone number cannot be empty".to_string(),
        ));
    }

    let country_code = phone_number.split(' ').next().unwrap_or_default();
    if !PHONE_COUNTRY_CODES.contains(&country_code) {
        return Err(TellerError::Validation(format!(
            "Phone country code is not valid: {}",
            country_code
        )));
    }

    Ok(())
}

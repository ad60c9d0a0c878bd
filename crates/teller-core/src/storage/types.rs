//! Core data types for the storage layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TellerError};
use crate::validation::{validate_email, validate_phone_number};

/// Metadata for a store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Format version (e.g., "0.1")
    pub format_version: String,

    /// Identity of this store instance
    pub store_id: Uuid,

    /// When this store was created
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp (informational)
    pub last_modified: DateTime<Utc>,
}

/// Product category an account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Student,
    Shared,
    Youth,
    YoungAdult,
}

impl AccountType {
    /// Stable string form used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Student => "student",
            AccountType::Shared => "shared",
            AccountType::Youth => "youth",
            AccountType::YoungAdult => "young_adult",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = TellerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "student" => Ok(AccountType::Student),
            "shared" => Ok(AccountType::Shared),
            "youth" => Ok(AccountType::Youth),
            "young_adult" => Ok(AccountType::YoungAdult),
            other => Err(TellerError::InvalidInput(format!(
                "Unknown account type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored account record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Caller-assigned identifier
    pub id: i64,

    /// Holder's full name
    pub full_name: String,

    /// Contact email (whitelisted domain)
    pub email: String,

    /// Optional contact phone number
    pub phone_number: Option<String>,

    /// Optional product category
    pub account_type: Option<AccountType>,

    /// When this account was created
    pub created_at: DateTime<Utc>,

    /// When this account was last modified
    pub updated_at: DateTime<Utc>,
}

/// A stored credential: the salted hash of an account password.
///
/// Credentials are append-only. A password change appends a new row; the
/// newest row is the account's current credential. Rows are deleted only
/// when the owning account is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Row identifier (monotonically increasing per store)
    pub id: i64,

    /// Owning account
    pub account_id: i64,

    /// Opaque secret blob: salt first, hash after
    pub secret: Vec<u8>,

    /// When this credential was created
    pub created_at: DateTime<Utc>,
}

/// Builder for creating new accounts.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Caller-assigned identifier
    pub id: i64,

    /// Holder's full name
    pub full_name: String,

    /// Contact email
    pub email: String,

    /// Optional contact phone number
    pub phone_number: Option<String>,

    /// Optional product category
    pub account_type: Option<AccountType>,
}

impl NewAccount {
    pub fn new(id: i64, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
            phone_number: None,
            account_type: None,
        }
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn with_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }

    /// Validate contact fields before the account reaches storage.
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(TellerError::Validation(
                "Full name cannot be empty".to_string(),
            ));
        }
        validate_email(&self.email)?;
        if let Some(ref phone_number) = self.phone_number {
            validate_phone_number(phone_number)?;
        }
        Ok(())
    }
}

/// Full replacement of an account's mutable fields (PUT semantics).
///
/// Credentials are never touched by an update; password changes go through
/// the dedicated password-change flow.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub account_type: Option<AccountType>,
}

impl AccountUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() {
            return Err(TellerError::Validation(
                "Full name cannot be empty".to_string(),
            ));
        }
        validate_email(&self.email)?;
        if let Some(ref phone_number) = self.phone_number {
            validate_phone_number(phone_number)?;
        }
        Ok(())
    }
}

/// Partial update of an account built from an untyped property dictionary
/// (PATCH semantics). Only fields present in the dictionary change.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub account_type: Option<AccountType>,
}

impl AccountPatch {
    /// Map a property-name dictionary onto typed account fields.
    ///
    /// Keys use the wire names (`fullName`, `email`, `phoneNumber`,
    /// `accountType`). Each value is validated with the same rules as
    /// account creation. Unknown keys, null values, non-string values, and
    /// an empty dictionary are all rejected; `id` and `password` are
    /// rejected by name since neither is patchable.
    pub fn from_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        if map.is_empty() {
            return Err(TellerError::InvalidInput(
                "Patch dictionary cannot be empty".to_string(),
            ));
        }

        let mut patch = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "fullName" => {
                    let name = Self::expect_string(key, value)?;
                    if name.trim().is_empty() {
                        return Err(TellerError::Validation(
                            "Full name cannot be empty".to_string(),
                        ));
                    }
                    patch.full_name = Some(name);
                }
                "email" => {
                    let email = Self::expect_string(key, value)?;
                    validate_email(&email)?;
                    patch.email = Some(email);
                }
                "phoneNumber" => {
                    let phone_number = Self::expect_string(key, value)?;
                    validate_phone_number(&phone_number)?;
                    patch.phone_number = Some(phone_number);
                }
                "accountType" => {
                    let raw = Self::expect_string(key, value)?;
                    patch.account_type = Some(raw.parse()?);
                }
                "id" => {
                    return Err(TellerError::InvalidInput(
                        "Account id cannot be changed".to_string(),
                    ));
                }
                "password" => {
                    return Err(TellerError::InvalidInput(
                        "Password cannot be changed through a patch; use the password-change flow"
                            .to_string(),
                    ));
                }
                other => {
                    return Err(TellerError::InvalidInput(format!(
                        "Unknown account property: {}",
                        other
                    )));
                }
            }
        }

        Ok(patch)
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.account_type.is_none()
    }

    fn expect_string(key: &str, value: &serde_json::Value) -> Result<String> {
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                TellerError::InvalidInput(format!("Property {} must be a string", key))
            })
    }
}

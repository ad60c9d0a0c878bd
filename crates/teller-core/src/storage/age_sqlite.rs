//! Age-encrypted SQLite storage backend.
//!
//! The database lives in memory while the store is open. `create` writes a
//! freshly initialized schema to disk; `open` decrypts and deserializes the
//! file; `close` serializes, re-encrypts, and persists atomically via a
//! temp-file rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::serialize::OwnedData;
use rusqlite::{Connection, DatabaseName, OptionalExtension};
use uuid::Uuid;

use age::secrecy::{ExposeSecret, SecretString};

use crate::crypto::{validate_passphrase, SECRET_LEN};
use crate::error::{Result, TellerError};
use crate::storage::encryption::{decrypt, encrypt};
use crate::storage::traits::AccountStore;
use crate::storage::types::{
    Account, AccountPatch, AccountUpdate, Credential, NewAccount, StoreMetadata,
};

/// Age-encrypted SQLite account store.
pub struct AgeSqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
    store_id: Uuid,
    // Retained to re-encrypt on close.
    passphrase: SecretString,
}

impl AgeSqliteStore {
    fn lock_conn(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| TellerError::Storage("SQLite connection poisoned".to_string()))
    }

    fn account_from_row(
        id: i64,
        full_name: String,
        email: String,
        phone_number: Option<String>,
        account_type: Option<String>,
        created_at_str: String,
        updated_at_str: String,
    ) -> Result<Account> {
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| TellerError::Storage(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map_err(|e| TellerError::Storage(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);
        let account_type = match account_type {
            Some(value) => Some(value.parse().map_err(|_| {
                TellerError::Storage(format!("Invalid account type in storage: {}", value))
            })?),
            None => None,
        };

        Ok(Account {
            id,
            full_name,
            email,
            phone_number,
            account_type,
            created_at,
            updated_at,
        })
    }

    fn credential_from_row(
        id: i64,
        account_id: i64,
        secret: Vec<u8>,
        created_at_str: String,
    ) -> Result<Credential> {
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| TellerError::Storage(format!("Invalid timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(Credential {
            id,
            account_id,
            secret,
            created_at,
        })
    }

    fn require_secret_len(secret: &[u8]) -> Result<()> {
        if secret.len() != SECRET_LEN {
            return Err(TellerError::MalformedSecret {
                expected: SECRET_LEN,
                found: secret.len(),
            });
        }
        Ok(())
    }

    fn serialized_payload(conn: &Connection) -> Result<Vec<u8>> {
        let data = conn.serialize(DatabaseName::Main)?;
        Ok(data.as_ref().to_vec())
    }

    fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
        if bytes.is_empty() {
            return Err(TellerError::Storage("SQLite payload is empty".to_string()));
        }

        let size: i32 = bytes
            .len()
            .try_into()
            .map_err(|_| TellerError::Storage("SQLite payload too large".to_string()))?;
        let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
        if raw.is_null() {
            return Err(TellerError::Storage("SQLite allocation failed".to_string()));
        }

        // Allocate with sqlite3_malloc so SQLite can own the buffer on deserialize.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), raw, bytes.len());
            let ptr = NonNull::new(raw).ok_or_else(|| {
                TellerError::Storage("SQLite allocation returned null".to_string())
            })?;
            Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
        }
    }

    /// Write the encrypted payload through a temp file and rename over the
    /// destination, with a remove-and-retry fallback for platforms where
    /// rename fails if the target exists.
    fn persist(path: &Path, payload: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("store.tmp");
        fs::write(&temp_path, payload)?;

        if let Err(initial_err) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(path);
            fs::rename(&temp_path, path).map_err(|retry_err| {
                let _ = fs::remove_file(&temp_path);
                TellerError::Storage(format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ))
            })?;
        }
        Ok(())
    }

    fn touch_last_modified(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE meta SET value = ? WHERE key = 'last_modified'",
            [Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl AccountStore for AgeSqliteStore {
    fn create(path: &Path, passphrase: &str) -> Result<Uuid> {
        if path.exists() {
            return Err(TellerError::Storage(
                "Store file already exists".to_string(),
            ));
        }

        validate_passphrase(passphrase)?;

        let store_id = Uuid::new_v4();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        conn.execute_batch(
            r#"
            CREATE TABLE meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE accounts (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone_number TEXT,
                account_type TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE credentials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                secret BLOB NOT NULL,
                created_at TEXT NOT NULL,

                FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
            );

            CREATE INDEX credentials_account_idx ON credentials(account_id);
            "#,
        )?;

        let created_at = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            ["format_version", "0.1"],
        )?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            ["store_id", &store_id.to_string()],
        )?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            ["created_at", &created_at],
        )?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)",
            ["last_modified", &created_at],
        )?;

        let plaintext = Self::serialized_payload(&conn)?;
        let encrypted = encrypt(&plaintext, passphrase)?;
        Self::persist(path, &encrypted)?;

        Ok(store_id)
    }

    fn open(path: &Path, passphrase: &str) -> Result<Self> {
        if !path.exists() {
            return Err(TellerError::StoreNotFound);
        }

        validate_passphrase(passphrase)?;

        let encrypted = fs::read(path)?;
        let plaintext = decrypt(&encrypted, passphrase)?;
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let owned_data = Self::owned_data_from_bytes(&plaintext)?;
        conn.deserialize(DatabaseName::Main, owned_data, false)?;

        let store_id_str: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'store_id'",
            [],
            |row| row.get(0),
        )?;
        let store_id = Uuid::parse_str(&store_id_str)
            .map_err(|e| TellerError::Storage(format!("Invalid store_id in metadata: {}", e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            store_id,
            passphrase: SecretString::from(passphrase.to_string()),
        })
    }

    fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| TellerError::Storage("SQLite connection poisoned".to_string()))?;
        let data = conn.serialize(DatabaseName::Main)?;
        let encrypted = encrypt(data.as_ref(), self.passphrase.expose_secret())?;
        Self::persist(&self.path, &encrypted)
    }

    fn metadata(&self) -> Result<StoreMetadata> {
        let conn = Self::lock_conn(&self.conn)?;

        let format_version: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'format_version'",
            [],
            |row| row.get(0),
        )?;

        let created_at_str: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'created_at'",
            [],
            |row| row.get(0),
        )?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| TellerError::Storage(format!("Invalid created_at timestamp: {}", e)))?
            .with_timezone(&Utc);

        let last_modified_str: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'last_modified'",
            [],
            |row| row.get(0),
        )?;
        let last_modified = DateTime::parse_from_rfc3339(&last_modified_str)
            .map_err(|e| TellerError::Storage(format!("Invalid last_modified timestamp: {}", e)))?
            .with_timezone(&Utc);

        Ok(StoreMetadata {
            format_version,
            store_id: self.store_id,
            created_at,
            last_modified,
        })
    }

    fn insert_account(&mut self, account: &NewAccount, secret: &[u8]) -> Result<()> {
        Self::require_secret_len(secret)?;

        let mut conn = Self::lock_conn(&self.conn)?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM accounts WHERE id = ?",
                [account.id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(TellerError::AccountExists(account.id));
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            INSERT INTO accounts (id, full_name, email, phone_number, account_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                account.id,
                &account.full_name,
                &account.email,
                account.phone_number.as_deref(),
                account.account_type.map(|t| t.as_str()),
                &now,
                &now,
            ),
        )?;

        tx.execute(
            "INSERT INTO credentials (account_id, secret, created_at) VALUES (?, ?, ?)",
            (account.id, secret, &now),
        )?;

        Self::touch_last_modified(&tx)?;
        tx.commit()?;

        Ok(())
    }

    fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = Self::lock_conn(&self.conn)?;

        let result = conn
            .query_row(
                r#"
                SELECT id, full_name, email, phone_number, account_type, created_at, updated_at
                FROM accounts
                WHERE id = ?
                "#,
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        match result {
            Some((id, full_name, email, phone_number, account_type, created_at, updated_at)) => {
                Ok(Some(Self::account_from_row(
                    id,
                    full_name,
                    email,
                    phone_number,
                    account_type,
                    created_at,
                    updated_at,
                )?))
            }
            None => Ok(None),
        }
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let conn = Self::lock_conn(&self.conn)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, full_name, email, phone_number, account_type, created_at, updated_at
            FROM accounts
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (id, full_name, email, phone_number, account_type, created_at, updated_at) = row?;
            accounts.push(Self::account_from_row(
                id,
                full_name,
                email,
                phone_number,
                account_type,
                created_at,
                updated_at,
            )?);
        }

        Ok(accounts)
    }

    fn update_account(&mut self, id: i64, update: &AccountUpdate) -> Result<()> {
        let conn = Self::lock_conn(&self.conn)?;

        let changed = conn.execute(
            r#"
            UPDATE accounts
            SET full_name = ?, email = ?, phone_number = ?, account_type = ?, updated_at = ?
            WHERE id = ?
            "#,
            (
                &update.full_name,
                &update.email,
                update.phone_number.as_deref(),
                update.account_type.map(|t| t.as_str()),
                Utc::now().to_rfc3339(),
                id,
            ),
        )?;
        if changed == 0 {
            return Err(TellerError::AccountNotFound(id));
        }

        Self::touch_last_modified(&conn)?;
        Ok(())
    }

    fn patch_account(&mut self, id: i64, patch: &AccountPatch) -> Result<()> {
        if patch.is_empty() {
            return Err(TellerError::InvalidInput(
                "Patch does not change any field".to_string(),
            ));
        }

        let conn = Self::lock_conn(&self.conn)?;

        let mut assignments: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref full_name) = patch.full_name {
            assignments.push("full_name = ?".to_string());
            params.push(Box::new(full_name.clone()));
        }
        if let Some(ref email) = patch.email {
            assignments.push("email = ?".to_string());
            params.push(Box::new(email.clone()));
        }
        if let Some(ref phone_number) = patch.phone_number {
            assignments.push("phone_number = ?".to_string());
            params.push(Box::new(phone_number.clone()));
        }
        if let Some(account_type) = patch.account_type {
            assignments.push("account_type = ?".to_string());
            params.push(Box::new(account_type.as_str().to_string()));
        }

        assignments.push("updated_at = ?".to_string());
        params.push(Box::new(Utc::now().to_rfc3339()));
        params.push(Box::new(id));

        let query = format!(
            "UPDATE accounts SET {} WHERE id = ?",
            assignments.join(", ")
        );
        let changed = conn.execute(&query, rusqlite::params_from_iter(params.iter()))?;
        if changed == 0 {
            return Err(TellerError::AccountNotFound(id));
        }

        Self::touch_last_modified(&conn)?;
        Ok(())
    }

    fn delete_account(&mut self, id: i64) -> Result<()> {
        let conn = Self::lock_conn(&self.conn)?;

        // Credential rows go with the account via ON DELETE CASCADE.
        let changed = conn.execute("DELETE FROM accounts WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(TellerError::AccountNotFound(id));
        }

        Self::touch_last_modified(&conn)?;
        Ok(())
    }

    fn append_credential(&mut self, account_id: i64, secret: &[u8]) -> Result<()> {
        Self::require_secret_len(secret)?;

        let conn = Self::lock_conn(&self.conn)?;

        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM accounts WHERE id = ?",
                [account_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(TellerError::AccountNotFound(account_id));
        }

        conn.execute(
            "INSERT INTO credentials (account_id, secret, created_at) VALUES (?, ?, ?)",
            (account_id, secret, Utc::now().to_rfc3339()),
        )?;

        Self::touch_last_modified(&conn)?;
        Ok(())
    }

    fn current_credential(&self, account_id: i64) -> Result<Option<Credential>> {
        let conn = Self::lock_conn(&self.conn)?;

        let result = conn
            .query_row(
                r#"
                SELECT id, account_id, secret, created_at
                FROM credentials
                WHERE account_id = ?
                ORDER BY id DESC
                LIMIT 1
                "#,
                [account_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match result {
            Some((id, account_id, secret, created_at)) => Ok(Some(Self::credential_from_row(
                id, account_id, secret, created_at,
            )?)),
            None => Ok(None),
        }
    }

    fn credential_history(&self, account_id: i64) -> Result<Vec<Credential>> {
        let conn = Self::lock_conn(&self.conn)?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, account_id, secret, created_at
            FROM credentials
            WHERE account_id = ?
            ORDER BY id DESC
            "#,
        )?;

        let rows = stmt.query_map([account_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut credentials = Vec::new();
        for row in rows {
            let (id, account_id, secret, created_at) = row?;
            credentials.push(Self::credential_from_row(
                id, account_id, secret, created_at,
            )?);
        }

        Ok(credentials)
    }

    fn check_integrity(&self) -> Result<()> {
        let conn = Self::lock_conn(&self.conn)?;

        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if rows.next()?.is_some() {
            return Err(TellerError::Storage(
                "Foreign key integrity check failed".to_string(),
            ));
        }

        let orphaned: i64 = conn.query_row(
            "SELECT COUNT(*) FROM credentials c LEFT JOIN accounts a ON c.account_id = a.id WHERE a.id IS NULL",
            [],
            |row| row.get(0),
        )?;
        if orphaned > 0 {
            return Err(TellerError::Storage(
                "Credentials reference missing accounts".to_string(),
            ));
        }

        let malformed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM credentials WHERE length(secret) != ?",
            [SECRET_LEN as i64],
            |row| row.get(0),
        )?;
        if malformed > 0 {
            return Err(TellerError::Storage(format!(
                "{} credential rows have malformed secrets",
                malformed
            )));
        }

        let uncredentialed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts a LEFT JOIN credentials c ON c.account_id = a.id WHERE c.id IS NULL",
            [],
            |row| row.get(0),
        )?;
        if uncredentialed > 0 {
            return Err(TellerError::Storage(
                "Accounts exist without any credential".to_string(),
            ));
        }

        let metadata_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM meta WHERE key IN ('format_version', 'store_id', 'created_at', 'last_modified')",
            [],
            |row| row.get(0),
        )?;
        if metadata_count < 4 {
            return Err(TellerError::Storage(
                "Metadata table missing required keys".to_string(),
            ));
        }

        Ok(())
    }
}

//! Credential hashing using Argon2id.
//!
//! A credential is stored as a single opaque blob: a random 16-byte salt
//! followed by a 32-byte Argon2id hash. Callers persist the blob as-is
//! (or base64-encode it for text columns) and pass it back for
//! verification. The blob has no other internal structure.

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{Result, TellerError};

/// Length of the random salt in bytes.
pub const SALT_LEN: usize = 16;

/// Length of the derived hash in bytes.
pub const HASH_LEN: usize = 32;

/// Length of a stored credential secret: salt first, hash after.
pub const SECRET_LEN: usize = SALT_LEN + HASH_LEN;

/// Argon2id cost parameters.
///
/// Injected at hasher construction rather than read from mutable globals,
/// so tests can run with cheap parameters while production uses
/// [`HashParams::RECOMMENDED`] everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of iterations (time cost)
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl HashParams {
    /// Production parameters: 1 MiB memory, 4 iterations, 8 lanes.
    pub const RECOMMENDED: Self = Self {
        memory_kib: 1024,
        iterations: 4,
        parallelism: 8,
    };
}

impl Default for HashParams {
    fn default() -> Self {
        Self::RECOMMENDED
    }
}

/// Hashes account passwords into storable secrets and verifies candidates
/// against them.
///
/// Both operations are pure and synchronous; a hasher is `Send + Sync` and
/// can be shared freely across threads. Each call allocates its own working
/// memory (`memory_kib` KiB), so callers embedding this in a hot path should
/// bound how many hashes run concurrently.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher {
    /// Create a hasher with the given cost parameters.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::Crypto` if the parameters are outside the
    /// ranges Argon2 accepts (e.g. memory below 8 KiB per lane).
    pub fn new(params: HashParams) -> Result<Self> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(HASH_LEN),
        )
        .map_err(|e| TellerError::Crypto(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password into a storable secret.
    ///
    /// Generates a fresh random salt, derives the Argon2id hash, and returns
    /// `salt ‖ hash` ([`SECRET_LEN`] bytes). Two calls with the same
    /// plaintext produce different outputs.
    ///
    /// # Errors
    ///
    /// - `TellerError::InvalidInput` if the plaintext is empty
    /// - `TellerError::EntropySource` if the OS random source fails
    pub fn hash(&self, plaintext: &str) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Err(TellerError::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }

        let mut salt = [0u8; SALT_LEN];
        getrandom::getrandom(&mut salt)
            .map_err(|e| TellerError::EntropySource(e.to_string()))?;

        let mut digest = [0u8; HASH_LEN];
        self.argon2
            .hash_password_into(plaintext.as_bytes(), &salt, &mut digest)
            .map_err(|e| TellerError::Crypto(format!("Key derivation failed: {}", e)))?;

        let mut secret = Vec::with_capacity(SECRET_LEN);
        secret.extend_from_slice(&salt);
        secret.extend_from_slice(&digest);
        Ok(secret)
    }

    /// Verify a plaintext candidate against a stored secret.
    ///
    /// Splits the secret into salt and expected hash, recomputes the hash of
    /// the candidate with the stored salt, and compares in constant time.
    /// A completed verification that returns `Ok(false)` is the normal
    /// wrong-password outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns `TellerError::MalformedSecret` if the stored blob is not
    /// exactly [`SECRET_LEN`] bytes. That indicates corrupted or truncated
    /// stored data and should be surfaced to operators, not end users.
    pub fn verify(&self, plaintext: &str, stored: &[u8]) -> Result<bool> {
        if stored.len() != SECRET_LEN {
            return Err(TellerError::MalformedSecret {
                expected: SECRET_LEN,
                found: stored.len(),
            });
        }

        let (salt, expected) = stored.split_at(SALT_LEN);

        let mut recomputed = Zeroizing::new([0u8; HASH_LEN]);
        self.argon2
            .hash_password_into(plaintext.as_bytes(), salt, recomputed.as_mut_slice())
            .map_err(|e| TellerError::Crypto(format!("Key derivation failed: {}", e)))?;

        Ok(bool::from(recomputed.as_slice().ct_eq(expected)))
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

//! Cryptographic operations for Teller.
//!
//! This module provides credential hashing and passphrase validation using
//! well-audited libraries:
//! - **Argon2id**: Memory-hard key derivation function
//! - **subtle**: Constant-time comparison primitives
//!
//! ## Security Model
//!
//! - Account passwords are stored as `salt ‖ hash` blobs derived with
//!   Argon2id; the salt is fresh per credential, so hashing is never
//!   deterministic and blobs must not be used for equality lookups.
//! - Verification recomputes the hash with the stored salt and compares in
//!   constant time, so timing does not reveal how many leading bytes match.
//! - Cost parameters are fixed at hasher construction and never vary per
//!   call, keeping them auditable across all credentials.
//! - Salt entropy comes from the OS CSPRNG; if it is unavailable the
//!   operation fails instead of degrading to a weaker source.
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the stored credential blobs (offline brute force)
//! - Timing side channels during verification
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to process memory while a plaintext password is in flight

pub mod hasher;
pub mod passphrase;

pub use hasher::{CredentialHasher, HashParams, HASH_LEN, SALT_LEN, SECRET_LEN};
pub use passphrase::validate_passphrase;

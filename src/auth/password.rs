//! Local password verification.
//!
//! The plaintext password never crosses the wire: the orchestrator fetches
//! the Argon2 hash over the signed inner channel and verifies here.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;
use tracing::warn;

/// Hash a password into a PHC string (Argon2id, default params).
///
/// # Errors
/// Fails when the underlying hasher rejects the input.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("password hashing failed: {err}"))
}

/// Verify a password against a stored PHC string.
///
/// A malformed stored hash verifies as false; the hash itself is never
/// logged.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        warn!("stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

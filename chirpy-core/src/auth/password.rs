//! Password hashing with Argon2id
//!
//! Hashing is deliberately slow, so both directions run on the blocking pool.

use argon2::{
    Argon2,
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{AuthError, Result};

/// Minimum accepted length for new passwords
pub const MIN_PASSWORD_LEN: usize = 8;

/// Fixed PHC string with the same Argon2id parameters `hash_password` uses.
/// Verifying against it costs exactly one real verification and never
/// matches a password a client would send.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$Y2hpcnB5LWR1bW15LXNsdA$eHTpc1Ge+x6dhFCRBzK5txvPF1nkr5VM207BVLuzmKc";

/// Hash a password into a PHC string with a fresh random salt
pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_blocking(&password)).await?
}

/// Check a password against a stored PHC string.
///
/// `Ok(false)` means "does not match". An error means the stored hash itself
/// is unusable.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_blocking(&password, &hash)).await?
}

/// Burn one verification against a fixed hash. Login calls this for unknown
/// emails so both failure paths take the same time.
pub async fn verify_dummy(password: String) -> Result<()> {
    tokio::task::spawn_blocking(move || verify_blocking(&password, DUMMY_HASH)).await??;
    Ok(())
}

/// Enforce the length rule applied on every write path
pub fn check_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooWeak(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashingFailure(e.to_string()))
}

fn verify_blocking(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::MalformedHash(e.to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::MalformedHash(e.to_string())),
    }
}

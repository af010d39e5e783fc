//! Password hashing and session tokens
//!
//! Passwords are stored as bcrypt hashes (salt and cost are embedded in the
//! hash string). Session tokens are 32 random bytes, hex encoded; only their
//! SHA-256 digest is persisted, so a copy of the database does not contain
//! usable tokens.
//!
//! This module contains ONLY pure functions. Persistence lives in
//! [`crate::db::users`].

use crate::{Error, Result};
use rand::Rng;
use sha2::{Digest, Sha256};

/// bcrypt work factor for new password hashes
pub const BCRYPT_COST: u32 = 10;

/// Generate an opaque session token (64 hex characters)
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    to_hex(&bytes)
}

/// Digest under which a session token is stored and looked up
///
/// # Examples
///
/// ```
/// use crm_common::auth::token_digest;
///
/// let digest = token_digest("abc");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, token_digest("abc"));
/// assert_ne!(digest, token_digest("abd"));
/// ```
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored bcrypt hash
///
/// A stored hash that is not valid bcrypt is an internal error, not a
/// failed login.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    bcrypt::verify(password, stored_hash)
        .map_err(|e| Error::Internal(format!("Stored password hash is unusable: {}", e)))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

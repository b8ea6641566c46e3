//! Password hashing (argon2id, PHC string format).

use std::sync::LazyLock;

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash with the same parameters as real accounts, verified when a login
/// names no account so both paths cost one argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("eduforall-no-such-account").ok());

/// Hash a plain password with argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
}

/// Verify a password against an argon2id hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Run a full verification for a login whose account does not exist.
/// Always false.
pub fn verify_missing_account(password: &str) -> bool {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        verify_password(password, hash);
    }
    false
}

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use std::sync::LazyLock;

use crate::error::AppError;

// Verified against when a login names no account, so both failure paths cost one Argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account").ok());

/// hash_password
///
/// One-way Argon2id hash with a fresh random salt, returned as a PHC string
/// (`$argon2id$v=19$...`). The plaintext is never stored anywhere else.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// verify_password
///
/// Returns false for a wrong password and for a stored value that is not a valid PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// The fixed hash that unknown-account logins are checked against. Calling it once at
/// startup keeps the first failed login from paying for the hash itself.
pub fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH.as_deref()
}

/// Runs one full verification whose result is discarded. Keeps an unknown email
/// indistinguishable by timing from a wrong password.
pub fn verify_against_dummy(password: &str) {
    if let Some(hash) = dummy_hash() {
        std::hint::black_box(verify_password(password, hash));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("password124", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_is_never_a_valid_hash() {
        assert!(!verify_password("secret", "secret"));
    }

    #[test]
    fn dummy_hash_is_a_real_phc_string() {
        let hash = dummy_hash().unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("no-such-account", hash));
        assert!(!verify_password("anything", hash));
    }
}

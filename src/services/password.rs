// SPDX-License-Identifier: MIT

//! Password hashing and verification using Argon2id.

use crate::error::AppError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Length of generated unusable passwords for social-only accounts.
const GENERATED_PASSWORD_LEN: usize = 32;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random high-entropy password for social-only accounts.
///
/// The plaintext is hashed and discarded; it exists only so every user record
/// carries a password hash and the schema stays uniform.
pub fn generate_unusable_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

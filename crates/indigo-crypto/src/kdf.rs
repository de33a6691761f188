use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::CryptoError;

/// Hash a wallet key with Argon2id. Returns the PHC string (salt included).
pub fn hash_password(password: &[u8]) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::KeyDerivationError(format!("argon2 hash failed: {}", e)))
}

/// Verify a password against a stored Argon2id hash.
pub fn verify_password(password: &[u8], hash_str: &str) -> Result<bool, CryptoError> {
    let argon2 = Argon2::default();
    let parsed_hash = argon2::PasswordHash::new(hash_str)
        .map_err(|e| CryptoError::KeyDerivationError(format!("invalid hash format: {}", e)))?;

    match argon2.verify_password(password, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::KeyDerivationError(format!(
            "verification error: {}",
            e
        ))),
    }
}

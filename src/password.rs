//! Password hashing and verification.
//!
//! Credentials are stored as Argon2id PHC strings. The salt is drawn from the
//! operating system RNG per hash, so identical passwords never share a digest.

use std::fmt;

use argon2::password_hash::{Error as HashParseError, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher as _, PasswordVerifier as _};
use rand::rngs::OsRng;
use rand::TryRngCore;
use thiserror::Error;

/// Salt length in bytes before base64 encoding.
const SALT_LEN: usize = 16;

/// Failures from the hashing backend. Wrong passwords are not errors; they
/// surface as `Ok(false)` from [`PasswordHasher::verify`].
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hashes and verifies passwords with Argon2id default parameters.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Hash a plaintext password into a PHC-format string.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| PasswordError::Hash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|err| PasswordError::Hash(err.to_string()))?;

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| PasswordError::Hash(err.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// Returns `Ok(false)` when the password does not match and `Err` only
    /// when the stored hash is unreadable or the backend fails.
    pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|err| PasswordError::Hash(err.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(HashParseError::Password) => Ok(false),
            Err(err) => Err(PasswordError::Hash(err.to_string())),
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

//! Password hashing and verification.
//!
//! # Invariants
//! - Hashes are Argon2id PHC strings with a fresh random salt per call.
//! - Verification never errors; a malformed stored hash simply fails.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Cost parameters rejected by the hashing backend.
    InvalidParams(String),
    Hashing(String),
}

impl Display for CredentialError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParams(reason) => write!(f, "invalid credential cost parameters: {reason}"),
            Self::Hashing(reason) => write!(f, "password hashing failed: {reason}"),
        }
    }
}

impl Error for CredentialError {}

/// One-way credential transform with configurable cost.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    params: Params,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl CredentialManager {
    /// Builds a manager with `time_cost` iterations over `memory_kib` KiB.
    pub fn with_cost(time_cost: u32, memory_kib: u32) -> Result<Self, CredentialError> {
        let params = Params::new(memory_kib, time_cost, Params::DEFAULT_P_COST, None)
            .map_err(|err| CredentialError::InvalidParams(err.to_string()))?;
        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `plaintext` with a new random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| CredentialError::Hashing(err.to_string()))
    }

    /// Returns whether `plaintext` matches the stored `hash`.
    ///
    /// Cost parameters are read from `hash`, so hashes created under an older
    /// cost configuration still verify.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.hasher()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{CredentialError, CredentialManager};

    fn fast() -> CredentialManager {
        CredentialManager::with_cost(1, 64).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_plaintext() {
        let credentials = fast();
        let hash = credentials.hash("Sup3rSecret").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(credentials.verify("Sup3rSecret", &hash));
        assert!(!credentials.verify("sup3rsecret", &hash));
    }

    #[test]
    fn salts_differ_between_calls() {
        let credentials = fast();
        let first = credentials.hash("same input").unwrap();
        let second = credentials.hash("same input").unwrap();
        assert_ne!(first, second);
        assert!(credentials.verify("same input", &first));
        assert!(credentials.verify("same input", &second));
    }

    #[test]
    fn malformed_hash_fails_verification() {
        assert!(!fast().verify("anything", "not-a-phc-string"));
    }

    #[test]
    fn zero_time_cost_is_rejected() {
        let err = CredentialManager::with_cost(0, 64).unwrap_err();
        assert!(matches!(err, CredentialError::InvalidParams(_)));
    }
}

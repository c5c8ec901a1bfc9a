use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(String);

impl From<tokio::task::JoinError> for HashError {
    fn from(e: tokio::task::JoinError) -> Self {
        HashError(format!("hashing task failed: {e}"))
    }
}

/// Salted one-way password hashing.
pub trait Hasher: Send + Sync {
    /// Every call draws a fresh salt, so equal inputs give different hashes.
    fn hash(&self, plain: &str) -> Result<String, HashError>;

    /// Fails closed: a mismatch or an unparsable hash is `false`.
    fn verify(&self, hash: &str, plain: &str) -> bool;
}

/// Argon2id producing PHC strings.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Hasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashError(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, hash: &str, plain: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(Params::new(8, 1, 1, None).expect("valid argon2 params"))
}

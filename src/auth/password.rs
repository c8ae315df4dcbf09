use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

const DUMMY_PASSWORD: &str = "loginkit-timing-equalizer";

/// Argon2id hashing with fixed cost parameters.
///
/// Also holds a hash of a throwaway password at the same cost, which
/// [`verify_dummy`](Self::verify_dummy) checks against so that lookups of
/// unknown users spend as long as lookups of real ones.
#[derive(Clone)]
pub struct PasswordHashing {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordHashing {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut hashing = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hashing.dummy_hash = hashing.hash(DUMMY_PASSWORD)?;
        Ok(hashing)
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Verifies `plain` against a stored PHC string.
    ///
    /// The parameters embedded in `hash` are used, so rows hashed under older
    /// cost settings keep verifying. Comparison is constant time.
    pub fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burns one verification worth of work. Always reports a mismatch.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(plain, &self.dummy_hash);
    }
}

#[cfg(test)]
pub(crate) fn test_hashing() -> PasswordHashing {
    PasswordHashing::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("test params are valid")
}

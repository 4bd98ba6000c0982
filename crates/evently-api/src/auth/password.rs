/// Password hashing and verification using Argon2id
///
/// Default parameters follow OWASP recommendations:
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 threads
/// - Output: 32 bytes hash, 16 bytes random salt
///
/// Hashing is CPU and memory heavy, so the async entry points run it on
/// the blocking thread pool.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2, Params,
};
use std::sync::Arc;
use thiserror::Error;

/// Plaintext behind the decoy hash; never matches a real login
const DECOY_PASSWORD: &str = "evently-decoy-credential";

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Argon2id cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (threads, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    /// Cheap parameters for tests
    pub fn light() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: Some(32),
        }
    }

    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// One-way credential hasher
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    config: PasswordConfig,
    /// PHC string hashed with `config`, verified against when there is no
    /// stored hash so both login failures cost the same
    decoy_hash: Arc<str>,
    #[cfg(test)]
    verifications: Arc<std::sync::atomic::AtomicUsize>,
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig) -> Result<Self, PasswordError> {
        // Reject bad parameters at startup rather than on first registration
        config.to_params()?;
        let mut hasher = Self {
            config,
            decoy_hash: Arc::from(""),
            #[cfg(test)]
            verifications: Arc::default(),
        };
        hasher.decoy_hash = Arc::from(hasher.hash_blocking(DECOY_PASSWORD)?);
        Ok(hasher)
    }

    /// Hash a plaintext password into a PHC string (algorithm, params, salt, hash)
    pub fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let params = self.config.to_params()?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Verify a plaintext password against a stored PHC string.
    ///
    /// A mismatch is `Ok(false)`; only a malformed hash is an error.
    pub fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        // Parameters are read from the PHC string
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
        }
    }

    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &hash))
            .await
            .map_err(|e| PasswordError::VerificationFailed(e.to_string()))?
    }

    /// Spend one verification's worth of work for an account that does
    /// not exist. The outcome is discarded.
    pub async fn verify_decoy(&self, password: &str) {
        let decoy = self.decoy_hash.clone();
        if let Err(e) = self.verify(password, &decoy).await {
            tracing::warn!(error = %e, "Decoy password verification failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn verification_count(&self) -> usize {
        self.verifications.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(PasswordConfig::light()).unwrap()
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hasher = hasher();
        let hash = hasher.hash_blocking("SecureP@ssw0rd!").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify_blocking("SecureP@ssw0rd!", &hash).unwrap());
        assert!(!hasher.verify_blocking("WrongPassword", &hash).unwrap());
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let hasher = hasher();
        let hash1 = hasher.hash_blocking("SamePassword123!").unwrap();
        let hash2 = hasher.hash_blocking("SamePassword123!").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hasher.verify_blocking("SamePassword123!", &hash1).unwrap());
        assert!(hasher.verify_blocking("SamePassword123!", &hash2).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        let result = hasher().verify_blocking("password", "invalid-hash-format");
        assert!(matches!(result, Err(PasswordError::InvalidHashFormat)));
    }

    #[test]
    fn test_params_are_embedded() {
        let hash = hasher().hash_blocking("TestPassword123!").unwrap();
        assert!(hash.contains("m=1024"));
        assert!(hash.contains("t=1"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig {
            parallelism: 0,
            ..PasswordConfig::light()
        };
        assert!(PasswordHasher::new(config).is_err());
    }

    #[test]
    fn test_decoy_hash_uses_configured_params() {
        let hasher = hasher();
        assert!(hasher.decoy_hash.starts_with("$argon2id$"));
        assert!(hasher.decoy_hash.contains("m=1024"));
        assert!(!hasher.verify_blocking("any-password", &hasher.decoy_hash).unwrap());
    }

    #[tokio::test]
    async fn test_verify_decoy_runs_a_verification() {
        let hasher = hasher();
        let before = hasher.verification_count();
        hasher.verify_decoy("guess").await;
        assert_eq!(hasher.verification_count(), before + 1);
    }

    #[tokio::test]
    async fn test_async_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("AsyncPassword1!").await.unwrap();
        assert!(hasher.verify("AsyncPassword1!", &hash).await.unwrap());
        assert!(!hasher.verify("nope", &hash).await.unwrap());
    }
}

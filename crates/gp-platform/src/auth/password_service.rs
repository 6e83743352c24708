//! Password Service
//!
//! Argon2id hashing and the signup password policy.

use argon2::{
    password_hash::{
        rand_core::OsRng,
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use tracing::debug;

use crate::shared::error::{PlatformError, Result};

/// Password policy configuration
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
        }
    }
}

impl PasswordPolicy {
    /// Validate a password, collecting every violated rule
    pub fn validate(&self, password: &str) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let length = password.chars().count();

        if length < self.min_length {
            errors.push(format!("Password must be at least {} characters", self.min_length));
        }
        if length > self.max_length {
            errors.push(format!("Password must be at most {} characters", self.max_length));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Password must contain at least one uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Password must contain at least one lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one digit".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone)]
pub struct Argon2Config {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
    /// Hash length in bytes
    pub output_len: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 19456, // 19 MiB
            time_cost: 2,
            parallelism: 1,
            output_len: 32,
        }
    }
}

impl Argon2Config {
    /// Cheap parameters for tests
    pub fn testing() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            output_len: 32,
        }
    }
}

pub struct PasswordService {
    argon2: Argon2<'static>,
    policy: PasswordPolicy,
}

impl PasswordService {
    pub fn new(config: Argon2Config, policy: PasswordPolicy) -> Result<Self> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(config.output_len),
        )
        .map_err(|e| PlatformError::internal(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            policy,
        })
    }

    /// Check a password against the policy without hashing it
    pub fn validate_password(&self, password: &str) -> Result<()> {
        self.policy
            .validate(password)
            .map_err(|errors| PlatformError::validation(errors.join("; ")))
    }

    /// Validate against the policy, then hash with Argon2id
    pub fn hash_password(&self, password: &str) -> Result<String> {
        self.validate_password(password)?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PlatformError::internal(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC hash string
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| PlatformError::internal(format!("Invalid password hash format: {}", e)))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => {
                debug!("Password verification failed");
                Ok(false)
            }
            Err(e) => Err(PlatformError::internal(format!("Password verification error: {}", e))),
        }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PasswordService {
        PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = service();
        let hash = service.hash_password("Patrol2024").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password("Patrol2024", &hash).unwrap());
        assert!(!service.verify_password("patrol2024", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let service = service();
        let a = service.hash_password("Patrol2024").unwrap();
        let b = service.hash_password("Patrol2024").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_policy() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("Patrol2024").is_ok());

        let errors = policy.validate("short").unwrap_err();
        assert!(errors.iter().any(|e| e.contains("at least 8")));
        assert!(errors.iter().any(|e| e.contains("uppercase")));
        assert!(errors.iter().any(|e| e.contains("digit")));

        assert!(policy.validate("ALLUPPER123").is_err());
        assert!(policy.validate("NoDigitsHere").is_err());
    }

    #[test]
    fn test_weak_password_not_hashed() {
        assert!(matches!(service().hash_password("weak"), Err(PlatformError::Validation { .. })));
    }

    #[test]
    fn test_malformed_hash() {
        assert!(service().verify_password("Patrol2024", "not-a-hash").is_err());
    }
}

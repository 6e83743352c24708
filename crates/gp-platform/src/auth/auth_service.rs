//! Authentication Service
//!
//! Session token generation and validation.
//! Signs with RS256 when a PEM key pair is configured, HS256 with the shared
//! secret otherwise.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;

use crate::user::entity::User;
use crate::shared::error::{PlatformError, Result};

/// JWT claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Organization the user belongs to
    pub org: String,

    /// Role ID at the time the token was issued
    pub role: String,

    pub email: String,

    /// Display name
    pub name: String,

    pub iss: String,

    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// JWT ID
    pub jti: String,
}

/// Configuration for the auth service
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// RSA private key PEM content; takes precedence over `secret_key`
    pub rsa_private_key: Option<String>,

    /// RSA public key PEM content
    pub rsa_public_key: Option<String>,

    /// HMAC secret for HS256
    pub secret_key: String,

    pub issuer: String,

    pub audience: String,

    /// Session token lifetime in seconds
    pub session_token_expiry_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            rsa_private_key: None,
            rsa_public_key: None,
            secret_key: String::new(),
            issuer: "guardpost".to_string(),
            audience: "guardpost".to_string(),
            session_token_expiry_secs: 43200, // 12 hours, one shift
        }
    }
}

impl AuthConfig {
    /// Read a PEM key pair from disk
    pub fn load_rsa_keys(private_key_path: &str, public_key_path: &str) -> Result<(String, String)> {
        let read = |path: &str| {
            fs::read_to_string(path).map_err(|e| PlatformError::internal(format!(
                "Failed to read JWT key {}: {}",
                path, e
            )))
        };
        let private_key = read(private_key_path)?;
        let public_key = read(public_key_path)?;
        info!(private_key_path, public_key_path, "Loaded JWT key pair");
        Ok((private_key, public_key))
    }

    pub fn with_rsa_keys(mut self, private_key: String, public_key: String) -> Self {
        self.rsa_private_key = Some(private_key);
        self.rsa_public_key = Some(public_key);
        self
    }
}

/// Authentication service for session tokens
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl AuthService {
    /// RS256 when both PEM keys are present, HS256 otherwise.
    ///
    /// Fails on unparsable keys or an empty HS256 secret.
    pub fn new(config: AuthConfig) -> Result<Self> {
        if let (Some(private_key), Some(public_key)) = (&config.rsa_private_key, &config.rsa_public_key) {
            let encoding_key = EncodingKey::from_rsa_pem(private_key.as_bytes())
                .map_err(|e| PlatformError::internal(format!("Invalid RSA private key: {}", e)))?;
            let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())
                .map_err(|e| PlatformError::internal(format!("Invalid RSA public key: {}", e)))?;

            info!("AuthService initialized with RS256");
            return Ok(Self {
                config,
                encoding_key,
                decoding_key,
                algorithm: Algorithm::RS256,
            });
        }

        if config.secret_key.is_empty() {
            return Err(PlatformError::internal("JWT secret is empty and no RSA keys are configured"));
        }

        let encoding_key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());

        info!("AuthService initialized with HS256");
        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            algorithm: Algorithm::HS256,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn session_expiry_secs(&self) -> i64 {
        self.config.session_token_expiry_secs
    }

    /// Issue a session token for a user
    pub fn generate_session_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.session_token_expiry_secs);

        let claims = SessionClaims {
            sub: user.id.clone(),
            org: user.organization_id.clone(),
            role: user.role_id.clone(),
            email: user.email.clone(),
            name: user.display_name().to_string(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: crate::TsidGenerator::generate(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| PlatformError::internal(format!("Failed to encode JWT: {}", e)))
    }

    /// Validate a session token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => PlatformError::TokenExpired,
                _ => PlatformError::InvalidToken { message: e.to_string() },
            })
    }
}

/// Extract bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(AuthConfig {
            secret_key: "test-secret-with-enough-length".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn user() -> User {
        User::new("ORG1", "ROLE1", "guard@example.com", "Gail Guard")
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = service();
        let user = user();
        let token = service.generate_session_token(&user).unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.org, "ORG1");
        assert_eq!(claims.role, "ROLE1");
        assert_eq!(claims.email, "guard@example.com");
        assert_eq!(claims.name, "Gail Guard");
        assert_eq!(claims.exp - claims.iat, 43200);
        assert_eq!(service.algorithm(), Algorithm::HS256);
    }

    #[test]
    fn test_rejects_foreign_and_garbage_tokens() {
        let token = service().generate_session_token(&user()).unwrap();

        let other = AuthService::new(AuthConfig {
            secret_key: "a-different-secret".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(other.validate_token(&token), Err(PlatformError::InvalidToken { .. })));
        assert!(matches!(service().validate_token("not.a.jwt"), Err(PlatformError::InvalidToken { .. })));
    }

    #[test]
    fn test_expired_token() {
        let service = AuthService::new(AuthConfig {
            secret_key: "test-secret-with-enough-length".to_string(),
            // Well past the default 60 second leeway
            session_token_expiry_secs: -600,
            ..Default::default()
        })
        .unwrap();
        let token = service.generate_session_token(&user()).unwrap();
        assert!(matches!(service.validate_token(&token), Err(PlatformError::TokenExpired)));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(AuthService::new(AuthConfig::default()).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}

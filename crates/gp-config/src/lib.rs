//! Guardpost Configuration System
//!
//! TOML-based configuration with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub mongodb: MongoConfig,
    pub auth: AuthConfig,
    pub attendance: AttendanceConfig,
    pub tracking: TrackingConfig,
    pub registration: RegistrationConfig,

    /// Seed a demo organization on startup
    pub dev_mode: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "guardpost".to_string(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub session: SessionConfig,
}

/// JWT configuration
///
/// RS256 is used when both key paths are set, HS256 with `secret` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
    pub private_key_path: String,
    pub public_key_path: String,
    pub session_token_expiry_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "guardpost".to_string(),
            audience: "guardpost".to_string(),
            secret: String::new(),
            private_key_path: String::new(),
            public_key_path: String::new(),
            session_token_expiry_secs: 43200, // 12 hours, one shift
        }
    }
}

impl JwtConfig {
    pub fn uses_rsa(&self) -> bool {
        !self.private_key_path.is_empty() && !self.public_key_path.is_empty()
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure: bool,
    pub same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "gp_session".to_string(),
            secure: true,
            same_site: "Lax".to_string(),
        }
    }
}

/// Attendance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// A second submission of the same kind inside this window is rejected
    pub duplicate_window_secs: u64,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self { duplicate_window_secs: 60 }
    }
}

/// Live tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Default look-back for the live feed
    pub live_window_minutes: u32,
    /// Push interval of the live SSE stream
    pub stream_interval_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            live_window_minutes: 30,
            stream_interval_secs: 10,
        }
    }
}

/// Registration token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub default_expiry_hours: u32,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self { default_expiry_hours: 72 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Check invariants the server relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::ValidationError("http.port must be non-zero".into()));
        }
        if self.mongodb.database.trim().is_empty() {
            return Err(ConfigError::ValidationError("mongodb.database must be set".into()));
        }
        if !self.auth.jwt.uses_rsa() && self.auth.jwt.secret.is_empty() && !self.dev_mode {
            return Err(ConfigError::ValidationError(
                "auth.jwt.secret or both auth.jwt key paths must be set".into(),
            ));
        }
        if self.tracking.stream_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tracking.stream_interval_secs must be at least 1".into(),
            ));
        }
        if self.tracking.live_window_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "tracking.live_window_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Guardpost Configuration
# Environment variables (GUARDPOST_*) override these settings

dev_mode = false

[http]
port = 8080
host = "0.0.0.0"
cors_origins = ["http://localhost:3000"]

[mongodb]
uri = "mongodb://localhost:27017"
database = "guardpost"

[auth.jwt]
issuer = "guardpost"
audience = "guardpost"
secret = ""
private_key_path = ""
public_key_path = ""
session_token_expiry_secs = 43200

[auth.session]
cookie_name = "gp_session"
secure = true
same_site = "Lax"

[attendance]
duplicate_window_secs = 60

[tracking]
live_window_minutes = 30
stream_interval_secs = 10

[registration]
default_expiry_hours = 72
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.mongodb.database, "guardpost");
        assert_eq!(config.attendance.duplicate_window_secs, 60);
        assert_eq!(config.tracking.live_window_minutes, 30);
        assert_eq!(config.auth.session.cookie_name, "gp_session");
        assert!(!config.auth.jwt.uses_rsa());
    }

    #[test]
    fn test_example_toml_parses() {
        let config: AppConfig = toml::from_str(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.tracking.stream_interval_secs, 10);
        assert_eq!(config.registration.default_expiry_hours, 72);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 9000\n\n[tracking]\nlive_window_minutes = 5").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.tracking.live_window_minutes, 5);
        assert_eq!(config.tracking.stream_interval_secs, 10);
    }

    #[test]
    fn test_validate_requires_signing_key() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.dev_mode = true;
        assert!(config.validate().is_ok());

        config.dev_mode = false;
        config.auth.jwt.secret = "s3cret".to_string();
        assert!(config.validate().is_ok());

        config.tracking.stream_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}

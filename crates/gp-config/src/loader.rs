//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "guardpost.toml",
    "./config/config.toml",
    "/etc/guardpost/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("GUARDPOST_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `GUARDPOST_*` overrides read through `lookup`.
///
/// Values that fail to parse are ignored and the file/default value stays.
fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
        raw.and_then(|v| v.trim().parse().ok())
    }

    // HTTP
    if let Some(port) = parsed(lookup("GUARDPOST_HTTP_PORT")) {
        config.http.port = port;
    }
    if let Some(val) = lookup("GUARDPOST_HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(val) = lookup("GUARDPOST_CORS_ORIGINS") {
        config.http.cors_origins = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    // MongoDB
    if let Some(val) = lookup("GUARDPOST_MONGODB_URI") {
        config.mongodb.uri = val;
    }
    if let Some(val) = lookup("GUARDPOST_MONGODB_DATABASE") {
        config.mongodb.database = val;
    }

    // Auth
    if let Some(val) = lookup("GUARDPOST_JWT_ISSUER") {
        config.auth.jwt.issuer = val;
    }
    if let Some(val) = lookup("GUARDPOST_JWT_AUDIENCE") {
        config.auth.jwt.audience = val;
    }
    if let Some(val) = lookup("GUARDPOST_JWT_SECRET") {
        config.auth.jwt.secret = val;
    }
    if let Some(val) = lookup("GUARDPOST_JWT_PRIVATE_KEY_PATH") {
        config.auth.jwt.private_key_path = val;
    }
    if let Some(val) = lookup("GUARDPOST_JWT_PUBLIC_KEY_PATH") {
        config.auth.jwt.public_key_path = val;
    }
    if let Some(secs) = parsed(lookup("GUARDPOST_SESSION_EXPIRY_SECS")) {
        config.auth.jwt.session_token_expiry_secs = secs;
    }
    if let Some(secure) = parsed(lookup("GUARDPOST_SESSION_SECURE")) {
        config.auth.session.secure = secure;
    }

    // Attendance / tracking
    if let Some(secs) = parsed(lookup("GUARDPOST_ATTENDANCE_DUPLICATE_WINDOW_SECS")) {
        config.attendance.duplicate_window_secs = secs;
    }
    if let Some(minutes) = parsed(lookup("GUARDPOST_TRACKING_LIVE_WINDOW_MINUTES")) {
        config.tracking.live_window_minutes = minutes;
    }
    if let Some(secs) = parsed(lookup("GUARDPOST_TRACKING_STREAM_INTERVAL_SECS")) {
        config.tracking.stream_interval_secs = secs;
    }

    // General
    if let Some(dev) = parsed(lookup("GUARDPOST_DEV_MODE")) {
        config.dev_mode = dev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = AppConfig::default();
        apply_overrides(
            &mut config,
            lookup_from(&[
                ("GUARDPOST_HTTP_PORT", "9090"),
                ("GUARDPOST_CORS_ORIGINS", "https://a.example, https://b.example,"),
                ("GUARDPOST_JWT_SECRET", "abc"),
                ("GUARDPOST_ATTENDANCE_DUPLICATE_WINDOW_SECS", "120"),
                ("GUARDPOST_DEV_MODE", "true"),
            ]),
        );

        assert_eq!(config.http.port, 9090);
        assert_eq!(
            config.http.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.auth.jwt.secret, "abc");
        assert_eq!(config.attendance.duplicate_window_secs, 120);
        assert!(config.dev_mode);
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = AppConfig::default();
        apply_overrides(
            &mut config,
            lookup_from(&[
                ("GUARDPOST_HTTP_PORT", "not-a-port"),
                ("GUARDPOST_TRACKING_STREAM_INTERVAL_SECS", "-3"),
            ]),
        );
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.tracking.stream_interval_secs, 10);
    }

    #[test]
    fn test_explicit_path_is_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dev_mode = true\n\n[mongodb]\ndatabase = \"gp_test\"").unwrap();

        let loader = ConfigLoader::with_path(file.path());
        assert_eq!(loader.find_config_file(), Some(file.path().to_path_buf()));

        let config = AppConfig::from_file(file.path()).unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.mongodb.database, "gp_test");
    }
}

//! User Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use regex::Regex;
use std::sync::OnceLock;

use crate::shared::error::{PlatformError, Result};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .expect("email pattern compiles")
    })
}

/// Lowercase and check an email address
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email_pattern().is_match(&email) {
        Ok(email)
    } else {
        Err(PlatformError::validation(format!("Invalid email address: {}", email)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub role_id: String,

    /// Lowercased, unique across all organizations
    pub email: String,

    pub full_name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub department: Option<String>,

    pub active: bool,

    /// Argon2id PHC string
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default, with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional")]
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        organization_id: impl Into<String>,
        role_id: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            role_id: role_id.into(),
            email: email.into().trim().to_lowercase(),
            full_name: full_name.into(),
            phone: None,
            department: None,
            active: true,
            password_hash: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_department(mut self, department: Option<String>) -> Self {
        self.department = department;
        self
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.phone = phone;
        self
    }

    /// Name shown on maps and lists
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_lowercases_email() {
        let user = User::new("ORG", "ROLE", "  Jane.Doe@Example.COM ", "Jane Doe");
        assert_eq!(user.email, "jane.doe@example.com");
        assert!(user.active);
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User::new("ORG", "ROLE", "x@example.com", "  ");
        assert_eq!(user.display_name(), "x@example.com");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@B.co ").unwrap(), "a@b.co");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("a b@c.com").is_err());
    }

    #[test]
    fn test_password_hash_not_serialized_when_absent() {
        let user = User::new("ORG", "ROLE", "x@example.com", "X");
        let doc = bson::to_document(&user).unwrap();
        assert!(!doc.contains_key("passwordHash"));
        assert!(!doc.contains_key("lastLoginAt"));
    }
}

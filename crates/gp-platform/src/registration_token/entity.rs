//! Registration Token Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use utoipa::ToSchema;

use crate::shared::error::PlatformError;
use crate::shared::secure_token;

/// Length of typed access codes
pub const ACCESS_CODE_LEN: usize = 8;

/// Longest lifetime a token can be issued with (ten years)
pub const MAX_EXPIRY_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// Short code typed by hand
    Code,
    /// Long random token embedded in a QR image
    Qr,
}

impl TokenKind {
    pub fn generate(self) -> String {
        match self {
            TokenKind::Code => secure_token::access_code(ACCESS_CODE_LEN),
            TokenKind::Qr => secure_token::url_safe_token(),
        }
    }
}

/// Why a token cannot be used for signup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenUnusable {
    Revoked,
    Expired,
    Exhausted,
}

impl TokenUnusable {
    pub fn reason(self) -> &'static str {
        match self {
            TokenUnusable::Revoked => "Registration token has been revoked",
            TokenUnusable::Expired => "Registration token has expired",
            TokenUnusable::Exhausted => "Registration token has reached its usage limit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationToken {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub kind: TokenKind,

    /// The secret a guard presents; unique
    pub code: String,

    /// Role granted at signup
    pub role_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub department: Option<String>,

    /// None means unlimited
    #[serde(default)]
    pub max_uses: Option<i64>,

    #[serde(default)]
    pub used_count: i64,

    #[serde(default, with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional")]
    pub expires_at: Option<DateTime<Utc>>,

    pub active: bool,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub created_by: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl RegistrationToken {
    pub fn new(organization_id: impl Into<String>, kind: TokenKind, role_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            kind,
            code: kind.generate(),
            role_id: role_id.into(),
            department: None,
            max_uses: None,
            used_count: 0,
            expires_at: None,
            active: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_uses(mut self, max_uses: Option<i64>) -> Self {
        self.max_uses = max_uses;
        self
    }

    /// Expire `hours` after creation; 1..=[`MAX_EXPIRY_HOURS`]
    pub fn expiring_in(mut self, hours: i64) -> Result<Self, PlatformError> {
        if !(1..=MAX_EXPIRY_HOURS).contains(&hours) {
            return Err(PlatformError::validation(format!(
                "expiresInHours must be between 1 and {}",
                MAX_EXPIRY_HOURS
            )));
        }
        let expires_at = Duration::try_hours(hours)
            .and_then(|d| self.created_at.checked_add_signed(d))
            .ok_or_else(|| PlatformError::validation("expiresInHours is out of range"))?;
        self.expires_at = Some(expires_at);
        Ok(self)
    }

    pub fn with_department(mut self, department: Option<String>) -> Self {
        self.department = department;
        self
    }

    pub fn created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }

    /// Check whether the token can still be consumed at `now`
    pub fn usability(&self, now: DateTime<Utc>) -> Result<(), TokenUnusable> {
        if !self.active {
            return Err(TokenUnusable::Revoked);
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(TokenUnusable::Expired);
        }
        if self.max_uses.is_some_and(|max| self.used_count >= max) {
            return Err(TokenUnusable::Exhausted);
        }
        Ok(())
    }

    pub fn remaining_uses(&self) -> Option<i64> {
        self.max_uses.map(|max| (max - self.used_count).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes() {
        let code = RegistrationToken::new("ORG", TokenKind::Code, "ROLE");
        assert_eq!(code.code.len(), ACCESS_CODE_LEN);
        assert!(code.code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let qr = RegistrationToken::new("ORG", TokenKind::Qr, "ROLE");
        assert_eq!(qr.code.len(), 43);
    }

    #[test]
    fn test_fresh_token_is_usable() {
        let token = RegistrationToken::new("ORG", TokenKind::Code, "ROLE")
            .with_max_uses(Some(2))
            .expiring_in(72)
            .unwrap();
        assert_eq!(token.usability(Utc::now()), Ok(()));
        assert_eq!(token.remaining_uses(), Some(2));
    }

    #[test]
    fn test_expiry_bounds() {
        let token = || RegistrationToken::new("ORG", TokenKind::Code, "ROLE");
        assert!(token().expiring_in(0).is_err());
        assert!(token().expiring_in(-5).is_err());
        assert!(token().expiring_in(MAX_EXPIRY_HOURS + 1).is_err());
        assert!(token().expiring_in(i64::MAX).is_err());

        let longest = token().expiring_in(MAX_EXPIRY_HOURS).unwrap();
        assert_eq!(
            longest.expires_at,
            Some(longest.created_at + Duration::hours(MAX_EXPIRY_HOURS))
        );
    }

    #[test]
    fn test_revoked() {
        let mut token = RegistrationToken::new("ORG", TokenKind::Code, "ROLE");
        token.active = false;
        assert_eq!(token.usability(Utc::now()), Err(TokenUnusable::Revoked));
    }

    #[test]
    fn test_expired() {
        let token = RegistrationToken::new("ORG", TokenKind::Code, "ROLE").expiring_in(1).unwrap();
        let later = token.created_at + Duration::hours(1);
        assert_eq!(token.usability(later), Err(TokenUnusable::Expired));
        assert_eq!(token.usability(later - Duration::seconds(1)), Ok(()));
    }

    #[test]
    fn test_exhausted() {
        let mut token = RegistrationToken::new("ORG", TokenKind::Qr, "ROLE").with_max_uses(Some(1));
        token.used_count = 1;
        assert_eq!(token.usability(Utc::now()), Err(TokenUnusable::Exhausted));
        assert_eq!(token.remaining_uses(), Some(0));
    }

    #[test]
    fn test_unlimited_without_expiry() {
        let mut token = RegistrationToken::new("ORG", TokenKind::Code, "ROLE");
        token.used_count = 10_000;
        assert_eq!(token.usability(Utc::now() + Duration::days(3650)), Ok(()));
        assert_eq!(token.remaining_uses(), None);
    }
}

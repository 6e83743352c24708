//! Common API types and utilities

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::shared::error::{PlatformError, Result};

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

pub(crate) mod string_or_number {
    use serde::{de, Deserialize, Deserializer};

    /// Accepts `25` as well as `"25"`, query strings deliver the latter
    pub fn deserialize_u32_opt<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNum {
            Num(u32),
            Str(String),
        }

        match Option::<StringOrNum>::deserialize(deserializer)? {
            Some(StringOrNum::Num(n)) => Ok(Some(n)),
            Some(StringOrNum::Str(s)) if s.trim().is_empty() => Ok(None),
            Some(StringOrNum::Str(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Result size limit for list endpoints
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Maximum number of rows (default 100, capped at 500)
    #[serde(default, deserialize_with = "string_or_number::deserialize_u32_opt")]
    limit: Option<u32>,
}

impl LimitParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT) as i64
    }
}

/// Success response with optional message
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Created response with ID
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
}

impl CreatedResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Trim a required text field, rejecting blank input
pub fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PlatformError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field, treating blank input as absent
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_clamps() {
        let params: LimitParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit(), 100);

        let params: LimitParams = serde_json::from_str(r#"{"limit":"25"}"#).unwrap();
        assert_eq!(params.limit(), 25);

        let params: LimitParams = serde_json::from_str(r#"{"limit":100000}"#).unwrap();
        assert_eq!(params.limit(), 500);

        let params: LimitParams = serde_json::from_str(r#"{"limit":0}"#).unwrap();
        assert_eq!(params.limit(), 1);

        assert!(serde_json::from_str::<LimitParams>(r#"{"limit":"many"}"#).is_err());
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(required_text("name", "  North Gate ").unwrap(), "North Gate");
        assert!(required_text("name", "   ").is_err());
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" B2 ".into())), Some("B2".into()));
        assert_eq!(optional_text(None), None);
    }
}

//! Platform Error Types

use thiserror::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response, Json},
};
use utoipa::ToSchema;

/// MongoDB server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Outside geofence: {distance_m}m from site, allowed radius {radius_m}m")]
    OutsideGeofence { distance_m: i64, radius_m: f64 },

    #[error("Invalid transition: cannot {action} {entity_type} in status {status}")]
    InvalidTransition { entity_type: String, status: String, action: String },

    #[error("Authorization error: {message}")]
    Unauthorized { message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {message}")]
    InvalidToken { message: String },

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn invalid_transition(
        entity_type: impl Into<String>,
        status: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            entity_type: entity_type.into(),
            status: status.into(),
            action: action.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// True when the error is a MongoDB unique index violation
    pub fn is_duplicate_key(&self) -> bool {
        use mongodb::error::{ErrorKind, WriteFailure};

        let PlatformError::Database(err) = self else {
            return false;
        };
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
            ErrorKind::InsertMany(e) => e
                .write_errors
                .as_ref()
                .is_some_and(|errs| errs.iter().any(|w| w.code == DUPLICATE_KEY_CODE)),
            _ => false,
        }
    }

    /// Map a duplicate-key write failure to a 409 for the given entity
    pub fn on_duplicate(self, entity_type: &str, field: &str, value: &str) -> Self {
        if self.is_duplicate_key() {
            Self::duplicate(entity_type, field, value)
        } else {
            self
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            PlatformError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            PlatformError::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE"),
            PlatformError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
            PlatformError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            PlatformError::OutsideGeofence { .. } => (StatusCode::BAD_REQUEST, "OUTSIDE_GEOFENCE"),
            PlatformError::InvalidTransition { .. } => (StatusCode::BAD_REQUEST, "INVALID_TRANSITION"),
            PlatformError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            PlatformError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            PlatformError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            PlatformError::InvalidToken { .. } => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            PlatformError::Database(_) if self.is_duplicate_key() => (StatusCode::CONFLICT, "DUPLICATE"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Error response body
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_code();

        // Internals stay in the log, the caller gets a generic message
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PlatformError::not_found("Site", "X"), StatusCode::NOT_FOUND),
            (PlatformError::duplicate("User", "email", "a@b.c"), StatusCode::CONFLICT),
            (PlatformError::conflict("Already checked in"), StatusCode::CONFLICT),
            (PlatformError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                PlatformError::OutsideGeofence { distance_m: 150, radius_m: 100.0 },
                StatusCode::BAD_REQUEST,
            ),
            (
                PlatformError::invalid_transition("Patrol", "COMPLETED", "start"),
                StatusCode::BAD_REQUEST,
            ),
            (PlatformError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (PlatformError::TokenExpired, StatusCode::UNAUTHORIZED),
            (PlatformError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_messages() {
        let err = PlatformError::OutsideGeofence { distance_m: 150, radius_m: 100.0 };
        assert_eq!(err.to_string(), "Outside geofence: 150m from site, allowed radius 100m");

        let err = PlatformError::invalid_transition("Patrol", "COMPLETED", "start");
        assert_eq!(err.to_string(), "Invalid transition: cannot start Patrol in status COMPLETED");
    }

    #[test]
    fn test_non_database_error_is_not_duplicate_key() {
        assert!(!PlatformError::validation("x").is_duplicate_key());
        let err = PlatformError::internal("x").on_duplicate("User", "email", "a@b.c");
        assert!(matches!(err, PlatformError::Internal { .. }));
    }
}

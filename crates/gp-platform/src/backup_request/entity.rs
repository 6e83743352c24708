//! Backup Request Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::{chrono_datetime_as_bson_datetime, chrono_datetime_as_bson_datetime_optional};
use utoipa::ToSchema;

use crate::geo::Coordinates;
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupStatus {
    Pending,
    Acknowledged,
    Resolved,
}

impl BackupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupStatus::Pending => "PENDING",
            BackupStatus::Acknowledged => "ACKNOWLEDGED",
            BackupStatus::Resolved => "RESOLVED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    /// Guard asking for backup
    pub guard_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub patrol_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nearest_checkpoint: Option<String>,

    pub latitude: f64,

    pub longitude: f64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,

    pub status: BackupStatus,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub acknowledged_by: Option<String>,

    #[serde(default, with = "chrono_datetime_as_bson_datetime_optional")]
    pub acknowledged_at: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono_datetime_as_bson_datetime_optional")]
    pub resolved_at: Option<DateTime<Utc>>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl BackupRequest {
    pub fn new(organization_id: impl Into<String>, guard_id: impl Into<String>, position: Coordinates) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            guard_id: guard_id.into(),
            patrol_id: None,
            nearest_checkpoint: None,
            latitude: position.latitude,
            longitude: position.longitude,
            message: None,
            status: BackupStatus::Pending,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn on_patrol(mut self, patrol_id: Option<String>, nearest_checkpoint: Option<String>) -> Self {
        self.patrol_id = patrol_id;
        self.nearest_checkpoint = nearest_checkpoint;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// PENDING -> ACKNOWLEDGED
    pub fn acknowledge(&mut self, by: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        if self.status != BackupStatus::Pending {
            return Err(PlatformError::invalid_transition("backup request", self.status.as_str(), "acknowledge"));
        }
        self.status = BackupStatus::Acknowledged;
        self.acknowledged_by = Some(by.into());
        self.acknowledged_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// PENDING or ACKNOWLEDGED -> RESOLVED
    pub fn resolve(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == BackupStatus::Resolved {
            return Err(PlatformError::invalid_transition("backup request", self.status.as_str(), "resolve"));
        }
        self.status = BackupStatus::Resolved;
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BackupRequest {
        BackupRequest::new("ORG", "G1", Coordinates::new(5.0, 6.0).unwrap())
    }

    #[test]
    fn test_acknowledge_then_resolve() {
        let mut r = request();
        assert_eq!(r.status, BackupStatus::Pending);
        let now = Utc::now();

        r.acknowledge("SUP", now).unwrap();
        assert_eq!(r.status, BackupStatus::Acknowledged);
        assert_eq!(r.acknowledged_by.as_deref(), Some("SUP"));
        assert_eq!(r.acknowledged_at, Some(now));

        r.resolve(now).unwrap();
        assert_eq!(r.status, BackupStatus::Resolved);
        assert_eq!(r.resolved_at, Some(now));
    }

    #[test]
    fn test_resolve_straight_from_pending() {
        let mut r = request();
        r.resolve(Utc::now()).unwrap();
        assert_eq!(r.status, BackupStatus::Resolved);
        assert!(r.acknowledged_by.is_none());
    }

    #[test]
    fn test_invalid_transitions() {
        let now = Utc::now();
        let mut r = request();
        r.acknowledge("SUP", now).unwrap();
        assert!(matches!(r.acknowledge("SUP", now), Err(PlatformError::InvalidTransition { .. })));

        r.resolve(now).unwrap();
        assert!(r.resolve(now).is_err());
        assert!(r.acknowledge("SUP", now).is_err());
    }
}

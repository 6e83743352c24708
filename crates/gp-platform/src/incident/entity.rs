//! Incident Entity
//!
//! Status moves freely between OPEN, INVESTIGATING and RESOLVED. CLOSED is
//! final. Entering RESOLVED or CLOSED stamps `resolvedAt`; going back to OPEN
//! or INVESTIGATING clears it.

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::{chrono_datetime_as_bson_datetime, chrono_datetime_as_bson_datetime_optional};
use utoipa::ToSchema;

use crate::geo::Coordinates;
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl IncidentSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentSeverity::Low => "LOW",
            IncidentSeverity::Medium => "MEDIUM",
            IncidentSeverity::High => "HIGH",
            IncidentSeverity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Open => "OPEN",
            IncidentStatus::Investigating => "INVESTIGATING",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Closed => "CLOSED",
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    /// User who reported the incident
    pub reported_by: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub patrol_id: Option<String>,

    pub title: String,

    pub description: String,

    pub severity: IncidentSeverity,

    pub status: IncidentStatus,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    #[serde(default, with = "chrono_datetime_as_bson_datetime_optional")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Incident {
    pub fn new(
        organization_id: impl Into<String>,
        reported_by: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        severity: IncidentSeverity,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            reported_by: reported_by.into(),
            patrol_id: None,
            title: title.into(),
            description: description.into(),
            severity,
            status: IncidentStatus::Open,
            latitude: None,
            longitude: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    pub fn on_patrol(mut self, patrol_id: Option<String>) -> Self {
        self.patrol_id = patrol_id;
        self
    }

    pub fn at(mut self, position: Option<Coordinates>) -> Self {
        self.latitude = position.map(|p| p.latitude);
        self.longitude = position.map(|p| p.longitude);
        self
    }

    pub fn change_status(&mut self, status: IncidentStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status == IncidentStatus::Closed {
            return Err(PlatformError::invalid_transition(
                "incident",
                self.status.as_str(),
                format!("move to {}", status.as_str()),
            ));
        }
        if status == self.status {
            return Ok(());
        }

        if status.is_resolved() {
            // RESOLVED -> CLOSED keeps the original resolution time
            self.resolved_at.get_or_insert(now);
        } else {
            self.resolved_at = None;
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn incident() -> Incident {
        Incident::new("ORG", "U1", "Broken fence", "North side", IncidentSeverity::High)
    }

    #[test]
    fn test_new_incident() {
        let i = incident().at(Some(Coordinates::new(1.0, 2.0).unwrap()));
        assert_eq!(i.status, IncidentStatus::Open);
        assert_eq!(i.severity, IncidentSeverity::High);
        assert_eq!(i.latitude, Some(1.0));
        assert!(i.resolved_at.is_none());
        assert_eq!(IncidentSeverity::default(), IncidentSeverity::Medium);
    }

    #[test]
    fn test_resolution_stamps() {
        let mut i = incident();
        let t1 = Utc::now();
        let t2 = t1 + Duration::minutes(5);

        i.change_status(IncidentStatus::Investigating, t1).unwrap();
        assert!(i.resolved_at.is_none());

        i.change_status(IncidentStatus::Resolved, t1).unwrap();
        assert_eq!(i.resolved_at, Some(t1));

        i.change_status(IncidentStatus::Closed, t2).unwrap();
        assert_eq!(i.resolved_at, Some(t1));
        assert_eq!(i.updated_at, t2);
    }

    #[test]
    fn test_reopen_clears_resolution() {
        let mut i = incident();
        let now = Utc::now();
        i.change_status(IncidentStatus::Resolved, now).unwrap();
        i.change_status(IncidentStatus::Open, now).unwrap();
        assert!(i.resolved_at.is_none());
    }

    #[test]
    fn test_closed_is_final() {
        let mut i = incident();
        let now = Utc::now();
        i.change_status(IncidentStatus::Closed, now).unwrap();
        let err = i.change_status(IncidentStatus::Open, now).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidTransition { .. }));
        assert!(i.change_status(IncidentStatus::Closed, now).is_err());
    }
}

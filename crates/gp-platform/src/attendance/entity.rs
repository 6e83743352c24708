//! Attendance Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use utoipa::ToSchema;

use crate::geo::Coordinates;
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceKind {
    CheckIn,
    CheckOut,
}

impl AttendanceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceKind::CheckIn => "CHECK_IN",
            AttendanceKind::CheckOut => "CHECK_OUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceMethod {
    /// Site QR code scanned
    Qr,
    /// Device position only
    Gps,
    /// Entered without a device position
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub site_id: Option<String>,

    pub kind: AttendanceKind,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accuracy: Option<f64>,

    /// Distance to the site center when a geofence was evaluated
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub distance_meters: Option<f64>,

    pub method: AttendanceMethod,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub recorded_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn new(
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
        kind: AttendanceKind,
        method: AttendanceMethod,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            user_id: user_id.into(),
            site_id: None,
            kind,
            latitude: None,
            longitude: None,
            accuracy: None,
            distance_meters: None,
            method,
            recorded_at,
        }
    }

    pub fn at_site(mut self, site_id: Option<String>) -> Self {
        self.site_id = site_id;
        self
    }

    pub fn with_position(mut self, position: Option<Coordinates>, accuracy: Option<f64>) -> Self {
        if let Some(p) = position {
            self.latitude = Some(p.latitude);
            self.longitude = Some(p.longitude);
        }
        self.accuracy = accuracy;
        self
    }

    pub fn with_distance(mut self, distance_meters: Option<f64>) -> Self {
        self.distance_meters = distance_meters;
        self
    }
}

/// Reject a submission that repeats `previous` within `window`
pub fn ensure_outside_duplicate_window(
    previous: Option<&AttendanceRecord>,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<()> {
    let Some(previous) = previous else {
        return Ok(());
    };
    let elapsed = now - previous.recorded_at;
    if elapsed < window {
        return Err(PlatformError::conflict(format!(
            "Duplicate {} submitted {}s after the previous one; wait {}s",
            previous.kind.as_str(),
            elapsed.num_seconds().max(0),
            window.num_seconds()
        )));
    }
    Ok(())
}

/// The open check-in a check-out closes
pub fn require_open_check_in(latest: Option<AttendanceRecord>) -> Result<AttendanceRecord> {
    match latest {
        Some(record) if record.kind == AttendanceKind::CheckIn => Ok(record),
        _ => Err(PlatformError::not_found("AttendanceRecord", "active check-in")),
    }
}

/// On duty iff the latest record is a check-in
pub fn is_on_duty(latest: Option<&AttendanceRecord>) -> bool {
    latest.is_some_and(|r| r.kind == AttendanceKind::CheckIn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: AttendanceKind, at: DateTime<Utc>) -> AttendanceRecord {
        AttendanceRecord::new("ORG", "U1", kind, AttendanceMethod::Gps, at)
    }

    #[test]
    fn test_duplicate_window() {
        let now = Utc::now();
        let window = Duration::seconds(60);

        assert!(ensure_outside_duplicate_window(None, now, window).is_ok());

        let recent = record(AttendanceKind::CheckIn, now - Duration::seconds(30));
        let err = ensure_outside_duplicate_window(Some(&recent), now, window).unwrap_err();
        assert!(matches!(err, PlatformError::Conflict { .. }));

        let old = record(AttendanceKind::CheckIn, now - Duration::seconds(60));
        assert!(ensure_outside_duplicate_window(Some(&old), now, window).is_ok());
    }

    #[test]
    fn test_require_open_check_in() {
        let now = Utc::now();
        assert!(require_open_check_in(None).is_err());
        assert!(require_open_check_in(Some(record(AttendanceKind::CheckOut, now))).is_err());

        let open = require_open_check_in(Some(record(AttendanceKind::CheckIn, now))).unwrap();
        assert_eq!(open.kind, AttendanceKind::CheckIn);
    }

    #[test]
    fn test_on_duty() {
        let now = Utc::now();
        assert!(!is_on_duty(None));
        assert!(is_on_duty(Some(&record(AttendanceKind::CheckIn, now))));
        assert!(!is_on_duty(Some(&record(AttendanceKind::CheckOut, now))));
    }

    #[test]
    fn test_kind_wire_format() {
        assert_eq!(serde_json::to_string(&AttendanceKind::CheckIn).unwrap(), "\"CHECK_IN\"");
        assert_eq!(serde_json::to_string(&AttendanceMethod::Qr).unwrap(), "\"QR\"");
        assert_eq!(AttendanceKind::CheckOut.as_str(), "CHECK_OUT");
    }
}

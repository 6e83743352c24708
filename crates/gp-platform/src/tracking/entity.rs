//! GPS Position Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

use crate::geo::Coordinates;
use crate::shared::error::{PlatformError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsPosition {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub user_id: String,

    pub latitude: f64,

    pub longitude: f64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accuracy: Option<f64>,

    /// Battery level in percent
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub battery: Option<f64>,

    /// Degrees clockwise from north
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub heading: Option<f64>,

    /// Meters per second
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub speed: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub patrol_id: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub recorded_at: DateTime<Utc>,
}

/// Device readings that accompany a position
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub accuracy: Option<f64>,
    pub battery: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

impl Telemetry {
    pub fn validate(&self) -> Result<()> {
        if let Some(battery) = self.battery {
            if !(0.0..=100.0).contains(&battery) {
                return Err(PlatformError::validation(format!(
                    "battery must be between 0 and 100, got {}",
                    battery
                )));
            }
        }
        if let Some(heading) = self.heading {
            if !(0.0..360.0).contains(&heading) {
                return Err(PlatformError::validation(format!(
                    "heading must be in [0, 360), got {}",
                    heading
                )));
            }
        }
        if let Some(accuracy) = self.accuracy {
            if !accuracy.is_finite() || accuracy < 0.0 {
                return Err(PlatformError::validation("accuracy must be non-negative"));
            }
        }
        if let Some(speed) = self.speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(PlatformError::validation("speed must be non-negative"));
            }
        }
        Ok(())
    }
}

impl GpsPosition {
    pub fn new(
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
        position: Coordinates,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            user_id: user_id.into(),
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy: None,
            battery: None,
            heading: None,
            speed: None,
            patrol_id: None,
            recorded_at,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.accuracy = telemetry.accuracy;
        self.battery = telemetry.battery;
        self.heading = telemetry.heading;
        self.speed = telemetry.speed;
        self
    }

    pub fn on_patrol(mut self, patrol_id: Option<String>) -> Self {
        self.patrol_id = patrol_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_bounds() {
        assert!(Telemetry::default().validate().is_ok());
        assert!(Telemetry { battery: Some(0.0), heading: Some(0.0), ..Default::default() }.validate().is_ok());
        assert!(Telemetry { battery: Some(100.0), heading: Some(359.9), ..Default::default() }.validate().is_ok());

        assert!(Telemetry { battery: Some(100.5), ..Default::default() }.validate().is_err());
        assert!(Telemetry { battery: Some(-1.0), ..Default::default() }.validate().is_err());
        assert!(Telemetry { heading: Some(360.0), ..Default::default() }.validate().is_err());
        assert!(Telemetry { accuracy: Some(-3.0), ..Default::default() }.validate().is_err());
    }

    #[test]
    fn test_new_position() {
        let at = Utc::now();
        let pos = GpsPosition::new("ORG", "U1", Coordinates::new(1.5, 2.5).unwrap(), at)
            .with_telemetry(Telemetry { battery: Some(80.0), ..Default::default() })
            .on_patrol(Some("P1".into()));

        assert_eq!(pos.latitude, 1.5);
        assert_eq!(pos.longitude, 2.5);
        assert_eq!(pos.battery, Some(80.0));
        assert_eq!(pos.patrol_id.as_deref(), Some("P1"));
        assert_eq!(pos.recorded_at, at);
        assert_eq!(pos.id.len(), 13);
    }
}

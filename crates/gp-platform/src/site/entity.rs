//! Site Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

use crate::geo::{Coordinates, Geofence};
use crate::shared::secure_token;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(rename = "_id")]
    pub id: String,

    pub organization_id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub address: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    /// Geofence radius; no geofence when absent
    #[serde(default)]
    pub radius_meters: Option<f64>,

    /// Printed as a QR code at the site; unique
    pub qr_token: String,

    pub active: bool,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            organization_id: organization_id.into(),
            name: name.into(),
            address: None,
            latitude: None,
            longitude: None,
            radius_meters: None,
            qr_token: secure_token::url_safe_token(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_location(mut self, location: Coordinates, radius_meters: Option<f64>) -> Self {
        self.latitude = Some(location.latitude);
        self.longitude = Some(location.longitude);
        self.radius_meters = radius_meters;
        self
    }

    pub fn rotate_qr_token(&mut self) {
        self.qr_token = secure_token::url_safe_token();
        self.updated_at = Utc::now();
    }

    /// The fence to enforce at check-in; None when coordinates or radius are missing
    pub fn geofence(&self) -> Option<Geofence> {
        match (self.latitude, self.longitude, self.radius_meters) {
            (Some(latitude), Some(longitude), Some(radius)) => Some(Geofence::new(
                Coordinates { latitude, longitude },
                radius,
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geofence_requires_all_parts() {
        let mut site = Site::new("ORG", "Warehouse");
        assert!(site.geofence().is_none());

        site.latitude = Some(40.0);
        site.longitude = Some(-74.0);
        assert!(site.geofence().is_none());

        site.radius_meters = Some(100.0);
        let fence = site.geofence().unwrap();
        assert_eq!(fence.radius_m, 100.0);
        assert_eq!(fence.center.latitude, 40.0);

        site.longitude = None;
        assert!(site.geofence().is_none());
    }

    #[test]
    fn test_rotate_qr_token() {
        let mut site = Site::new("ORG", "Warehouse");
        let old = site.qr_token.clone();
        site.rotate_qr_token();
        assert_ne!(old, site.qr_token);
    }
}

//! Great-circle distance and geofence decisions
//!
//! Haversine over a spherical Earth. Accurate enough for site radii of a
//! few hundred meters; no special handling of the poles or antimeridian.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A validated WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Validate latitude in [-90, 90] and longitude in [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(PlatformError::validation(format!(
                "latitude must be between -90 and 90, got {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(PlatformError::validation(format!(
                "longitude must be between -180 and 180, got {}",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// Both-or-neither optional pair
    pub fn from_optional(latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<Self>> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            (None, None) => Ok(None),
            _ => Err(PlatformError::validation(
                "latitude and longitude must be provided together",
            )),
        }
    }
}

/// Haversine distance between two positions, in meters
pub fn haversine_m(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Circular fence around a site
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    pub center: Coordinates,
    pub radius_m: f64,
}

/// Outcome of testing a position against a fence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceCheck {
    pub distance_m: f64,
    pub inside: bool,
}

impl GeofenceCheck {
    /// Distance rounded to whole meters, as reported to clients
    pub fn rounded_distance(&self) -> i64 {
        self.distance_m.round() as i64
    }
}

impl Geofence {
    pub fn new(center: Coordinates, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    /// Inside iff distance <= radius; the boundary counts as inside
    pub fn check(&self, position: Coordinates) -> GeofenceCheck {
        let distance_m = haversine_m(self.center, position);
        GeofenceCheck {
            distance_m,
            inside: distance_m <= self.radius_m,
        }
    }

    /// Like [`Geofence::check`] but rejects positions outside the fence
    pub fn enforce(&self, position: Coordinates) -> Result<GeofenceCheck> {
        let check = self.check(position);
        if check.inside {
            Ok(check)
        } else {
            Err(PlatformError::OutsideGeofence {
                distance_m: check.rounded_distance(),
                radius_m: self.radius_m,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    #[test]
    fn test_identical_points_zero_distance() {
        for (lat, lng) in [(0.0, 0.0), (40.0, -74.0), (-33.86, 151.21), (89.9, 179.9)] {
            assert_eq!(haversine_m(pos(lat, lng), pos(lat, lng)), 0.0);
        }
    }

    #[test]
    fn test_antipodal_half_circumference() {
        let half = std::f64::consts::PI * EARTH_RADIUS_M;
        let d = haversine_m(pos(0.0, 0.0), pos(0.0, 180.0));
        assert!((d - half).abs() < 1.0, "got {}", d);
        assert!((d - 20_015_086.0).abs() < 1_000.0);

        let d = haversine_m(pos(40.0, -74.0), pos(-40.0, 106.0));
        assert!((d - half).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            (pos(40.0, -74.0), pos(51.5, -0.12)),
            (pos(-33.86, 151.21), pos(35.68, 139.69)),
            (pos(1.0, 179.0), pos(-1.0, -179.0)),
        ];
        for (a, b) in pairs {
            assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_worked_example() {
        let fence = Geofence::new(pos(40.0, -74.0), 100.0);

        let far = fence.check(pos(40.0009, -74.0));
        assert!(!far.inside);
        assert!((far.distance_m - 100.07).abs() < 0.05, "got {}", far.distance_m);

        let near = fence.check(pos(40.0004, -74.0));
        assert!(near.inside);
        assert!((near.distance_m - 44.48).abs() < 0.05, "got {}", near.distance_m);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let center = pos(40.0, -74.0);
        let edge = pos(40.0009, -74.0);
        let exact = haversine_m(center, edge);

        assert!(Geofence::new(center, exact).check(edge).inside);
        assert!(!Geofence::new(center, exact - 1e-6).check(edge).inside);
    }

    #[test]
    fn test_enforce_reports_rounded_distance() {
        let fence = Geofence::new(pos(40.0, -74.0), 100.0);
        match fence.enforce(pos(40.0009, -74.0)) {
            Err(PlatformError::OutsideGeofence { distance_m, radius_m }) => {
                assert_eq!(distance_m, 100);
                assert_eq!(radius_m, 100.0);
            }
            other => panic!("expected geofence rejection, got {:?}", other),
        }
        assert!(fence.enforce(pos(40.0004, -74.0)).is_ok());
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
        assert!(Coordinates::new(90.01, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());

        assert_eq!(Coordinates::from_optional(None, None).unwrap(), None);
        assert!(Coordinates::from_optional(Some(1.0), None).is_err());
        assert_eq!(
            Coordinates::from_optional(Some(1.0), Some(2.0)).unwrap(),
            Some(pos(1.0, 2.0))
        );
    }
}

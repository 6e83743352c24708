//! Site Aggregate
//!
//! Guarded locations with an optional geofence and a QR token posted on site.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::Site;
pub use repository::SiteRepository;
pub use api::{SitesState, sites_router};

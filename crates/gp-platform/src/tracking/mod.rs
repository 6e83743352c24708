//! Tracking Aggregate
//!
//! Device positions reported by guards, the live map built from them and
//! per-guard history.

pub mod entity;
pub mod repository;
pub mod aggregator;
pub mod api;

pub use entity::GpsPosition;
pub use repository::GpsPositionRepository;
pub use aggregator::{latest_per_user, live_snapshot, LivePosition, MongoPositionSource, PositionSource};
pub use api::{TrackingState, tracking_router};

//! Patrol Route Aggregate
//!
//! Named, ordered lists of checkpoints that patrols walk.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{PatrolRoute, normalize_checkpoints};
pub use repository::PatrolRouteRepository;
pub use api::{PatrolRoutesState, patrol_routes_router};

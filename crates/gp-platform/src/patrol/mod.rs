//! Patrol Aggregate
//!
//! A guard walking a route: lifecycle, checkpoint visits and statistics.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{CheckpointVisit, Patrol, PatrolStats, PatrolStatus};
pub use repository::{PatrolFilter, PatrolRepository};
pub use api::{PatrolsState, patrols_router};

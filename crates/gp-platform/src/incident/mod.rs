//! Incident Aggregate

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{Incident, IncidentSeverity, IncidentStatus};
pub use repository::{IncidentFilter, IncidentRepository};
pub use api::{IncidentsState, incidents_router};

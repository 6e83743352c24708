//! Organization Aggregate
//!
//! The tenant boundary. Every other aggregate carries an organization id.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::Organization;
pub use repository::OrganizationRepository;
pub use api::{OrganizationState, organization_router};

//! User Aggregate
//!
//! Organization members. Administered as "guards" over HTTP.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::User;
pub use repository::{UserRepository, GuardFilter};
pub use api::{GuardsState, GuardResponse, guards_router};

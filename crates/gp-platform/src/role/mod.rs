//! Role Aggregate
//!
//! Named permission sets assigned to users.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{Role, Permissions};
pub use repository::RoleRepository;
pub use api::{RolesState, roles_router};

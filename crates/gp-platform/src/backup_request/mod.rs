//! Backup Request Aggregate
//!
//! A guard asking for support at their position, acknowledged and resolved
//! by supervisors.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{BackupRequest, BackupStatus};
pub use repository::BackupRequestRepository;
pub use api::{BackupRequestsState, backup_requests_router};

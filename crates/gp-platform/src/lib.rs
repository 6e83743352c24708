//! Guardpost Platform
//!
//! Workforce platform for security guard companies:
//! - Attendance with QR codes and geofenced check-in
//! - Live GPS tracking with a server-sent events feed
//! - Patrol routes, patrols and checkpoint visits
//! - Incident reports and backup requests
//! - Registration tokens, roles and session authentication
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - `api` - REST endpoints

// Tenant and identity aggregates
pub mod organization;
pub mod role;
pub mod user;
pub mod registration_token;

// Field operations
pub mod site;
pub mod attendance;
pub mod tracking;
pub mod patrol_route;
pub mod patrol;
pub mod incident;
pub mod backup_request;

// Authentication
pub mod auth;

// Shared infrastructure
pub mod geo;
pub mod shared;

// Cross-cutting concerns
pub mod seed;
pub mod app;

pub use shared::error::{PlatformError, Result};
pub use shared::tsid::TsidGenerator;

pub use geo::{Coordinates, Geofence, GeofenceCheck};
pub use app::{Platform, PlatformSettings};

// Re-export main entity types for convenience
pub use organization::Organization;
pub use role::{Role, Permissions};
pub use user::User;
pub use registration_token::{RegistrationToken, TokenKind};
pub use site::Site;
pub use attendance::{AttendanceRecord, AttendanceKind, AttendanceMethod};
pub use tracking::{GpsPosition, LivePosition};
pub use patrol_route::PatrolRoute;
pub use patrol::{Patrol, PatrolStatus, PatrolStats, CheckpointVisit};
pub use incident::{Incident, IncidentSeverity, IncidentStatus};
pub use backup_request::{BackupRequest, BackupStatus};

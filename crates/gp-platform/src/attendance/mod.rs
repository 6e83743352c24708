//! Attendance Aggregate
//!
//! QR / GPS check-in and check-out records, gated by the site geofence.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{AttendanceRecord, AttendanceKind, AttendanceMethod};
pub use repository::{AttendanceRepository, AttendanceFilter};
pub use api::{AttendanceState, attendance_router};

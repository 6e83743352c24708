//! Shared infrastructure used across aggregates

pub mod error;
pub mod tsid;
pub mod api_common;
pub mod secure_token;
pub mod middleware;
pub mod indexes;
pub mod health_api;

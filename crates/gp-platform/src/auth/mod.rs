//! Authentication
//!
//! Session tokens (JWT), password hashing and the login/signup endpoints.

pub mod auth_service;
pub mod password_service;
pub mod auth_api;

pub use auth_service::{AuthConfig, AuthService, SessionClaims, extract_bearer_token};
pub use password_service::{Argon2Config, PasswordPolicy, PasswordService};
pub use auth_api::{AuthState, SessionCookieSettings, auth_router};

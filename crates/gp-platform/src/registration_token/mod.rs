//! Registration Token Aggregate
//!
//! Access codes and QR tokens that let new guards sign up into an
//! organization with a preset role and department.

pub mod entity;
pub mod repository;
pub mod api;

pub use entity::{RegistrationToken, TokenKind, TokenUnusable};
pub use repository::RegistrationTokenRepository;
pub use api::{RegistrationTokensState, registration_tokens_router};

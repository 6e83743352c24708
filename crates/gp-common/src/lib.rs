//! Guardpost shared infrastructure.
//!
//! Small pieces every Guardpost binary needs before it can do anything
//! useful, currently just logging setup.

pub mod logging;

pub use logging::{init_logging, LogFormat};

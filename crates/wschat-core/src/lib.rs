//! `wschat` Core Library
//!
//! Shared functionality for `wschat` components:
//! - Layered configuration (defaults, TOML file, environment)
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};

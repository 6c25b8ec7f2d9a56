//! # Opsdesk Config
//!
//! Configuration management for the opsdesk action processor.
//! Supports layered configuration from TOML files and environment variables,
//! validated as a whole before anything touches the database.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;

//! # Opsdesk Core
//!
//! Core types, error definitions and logging setup shared by every opsdesk
//! crate. Nothing in here knows about the action queue itself; it is the
//! foundation the repository, jobs, REST and server layers build on.

pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use id::*;
pub use result::*;

// Re-export shaku for dependency injection
pub use shaku::{module, HasComponent, Interface};

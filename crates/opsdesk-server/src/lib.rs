//! # Opsdesk Server Library
//!
//! Wiring for the `opsdesk-processor` binary: command line parsing,
//! dependency injection over the MySQL pool, and assembly of the action
//! queue service used by both the `run` and `serve` commands.

pub mod app;
pub mod cli;
pub mod di;
pub mod startup;

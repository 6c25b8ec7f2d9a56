//! # Opsdesk REST
//!
//! HTTP surface for the action processor: an authenticated trigger that runs
//! one invocation, health endpoints for load balancers and dashboards, and
//! the Prometheus scrape endpoint.

pub mod controllers;
pub mod middleware;
pub mod responses;
pub mod router;
pub mod state;

pub use router::*;
pub use state::*;

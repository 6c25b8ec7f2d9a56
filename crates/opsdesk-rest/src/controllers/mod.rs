//! REST API controllers.

pub mod actions_controller;
pub mod health_controller;
pub mod metrics_controller;

pub use health_controller::*;

//! MySQL access to the admin tables that deferred actions mutate.
//!
//! Every function takes any [`sqlx::MySqlExecutor`], so callers can run it on
//! the pool or inside an open transaction, and issues exactly one statement.

pub mod feature_modules;
pub mod pages;
pub mod payroll;
pub mod seo;
pub mod settings;

//! # Opsdesk Repository
//!
//! MySQL plumbing shared by the processor:
//!
//! ```text
//! DatabasePool (shaku component, sqlx MySqlPool, migrations)
//!   ↓
//! mysql::{settings, pages, feature_modules, payroll, seo}
//!   single-statement helpers over any MySqlExecutor,
//!   called by the action handlers inside their transaction
//! ```
//!
//! The action queue and health tables are accessed by the store in
//! `opsdesk-jobs`; this crate only owns the connection and the admin tables.

pub mod mysql;
pub mod pool;

pub use pool::*;

//! MySQL backend: job store, unit of work and audit sink.

mod audit;
mod store;

pub use audit::MySqlAuditSink;
pub use store::{MySqlJobStore, MySqlUnit};

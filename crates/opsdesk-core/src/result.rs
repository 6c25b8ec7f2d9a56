//! Result type aliases for opsdesk.

use crate::OpsError;

/// A specialized `Result` type for opsdesk operations.
pub type OpsResult<T> = Result<T, OpsError>;

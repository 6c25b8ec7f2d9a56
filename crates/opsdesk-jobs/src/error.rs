//! Processor and handler error types.

use crate::job::ActionType;
use opsdesk_core::OpsError;
use thiserror::Error;

/// Result type for processor operations.
pub type JobResult<T> = Result<T, JobError>;

/// Processor-level errors.
///
/// [`JobError::Setup`] and [`JobError::Configuration`] mean the invocation
/// never started. Store failures during sweep or selection also end it;
/// failures while recording a single job are logged and left for the next
/// sweep to resolve.
#[derive(Debug, Error)]
pub enum JobError {
    /// The processor could not start (store unreachable, bad parameters).
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Recording a job state transition failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value outside the known vocabulary.
    #[error("Invalid stored value for {field}: {value}")]
    InvalidStoredValue { field: &'static str, value: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Returns true if this error should abort the invocation with a failure exit.
    pub fn is_setup(&self) -> bool {
        matches!(self, JobError::Setup(_) | JobError::Configuration(_))
    }

    /// Wraps any error as a setup failure.
    pub fn setup(err: impl std::fmt::Display) -> Self {
        JobError::Setup(err.to_string())
    }
}

impl From<OpsError> for JobError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::Configuration(msg) | OpsError::Validation(msg) => JobError::Configuration(msg),
            OpsError::Database(msg) | OpsError::Timeout(msg) => JobError::Persistence(msg),
            other => JobError::Internal(other.to_string()),
        }
    }
}

/// Error returned by an action handler.
///
/// Every variant is treated the same by the retry policy; the distinction
/// exists for logs, audit summaries and tests.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Nothing is registered for this action type.
    #[error("No handler registered for action type {0}")]
    NoHandler(ActionType),

    /// The payload could not be decoded or failed validation.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The entity the action targets does not exist.
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// A business rule rejected the action.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The handler's own database work failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Creates a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }

    /// Short machine-readable kind, used as a metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::NoHandler(_) => "no_handler",
            HandlerError::InvalidPayload(_) => "invalid_payload",
            HandlerError::TargetNotFound(_) => "target_not_found",
            HandlerError::Rejected(_) => "rejected",
            HandlerError::Database(_) => "database",
            HandlerError::Failed(_) => "failed",
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::InvalidPayload(err.to_string())
    }
}

impl From<validator::ValidationErrors> for HandlerError {
    fn from(err: validator::ValidationErrors) -> Self {
        HandlerError::InvalidPayload(err.to_string())
    }
}

impl From<sqlx::Error> for HandlerError {
    fn from(err: sqlx::Error) -> Self {
        HandlerError::Database(err.to_string())
    }
}

impl From<OpsError> for HandlerError {
    fn from(err: OpsError) -> Self {
        match err {
            OpsError::NotFound { resource_type, id } => {
                HandlerError::TargetNotFound(format!("{} {}", resource_type, id))
            }
            OpsError::Validation(msg) => HandlerError::InvalidPayload(msg),
            OpsError::Conflict(msg) => HandlerError::Rejected(msg),
            OpsError::Database(msg) => HandlerError::Database(msg),
            other => HandlerError::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_are_fatal() {
        assert!(JobError::Setup("store unreachable".into()).is_setup());
        assert!(JobError::Configuration("batch_size".into()).is_setup());
        assert!(!JobError::Persistence("lost".into()).is_setup());
    }

    #[test]
    fn test_setup_helper() {
        let err = JobError::setup("connection refused");
        assert_eq!(err.to_string(), "Setup failed: connection refused");
    }

    #[test]
    fn test_from_ops_error() {
        let err: JobError = OpsError::Database("gone".into()).into();
        assert!(matches!(err, JobError::Persistence(_)));

        let err: JobError = OpsError::configuration("bad").into();
        assert!(err.is_setup());
    }

    #[test]
    fn test_handler_error_from_serde() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: HandlerError = json_err.into();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
        assert_eq!(err.kind(), "invalid_payload");
    }

    #[test]
    fn test_handler_error_from_not_found() {
        let err: HandlerError = OpsError::not_found("cms_page", "about").into();
        assert_eq!(err.to_string(), "Target not found: cms_page about");
    }

    #[test]
    fn test_no_handler_display() {
        let err = HandlerError::NoHandler(ActionType::SeoUpdate);
        assert_eq!(err.to_string(), "No handler registered for action type seo_update");
    }

    #[test]
    fn test_failed_display_is_bare_message() {
        assert_eq!(HandlerError::failed("upstream 503").to_string(), "upstream 503");
    }
}

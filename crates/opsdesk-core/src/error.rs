//! Unified error types shared across the opsdesk layers.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for the infrastructure and presentation layers.
///
/// Job-level failures have their own taxonomy in `opsdesk-jobs`; this enum
/// covers what sits around it (database, configuration, HTTP surface).
#[derive(Error, Debug)]
pub enum OpsError {
    // ============ Request Errors ============
    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict error (e.g., duplicate entry)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ============ Infrastructure Errors ============
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External service error
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OpsError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Timeout(_) => 503,
            Self::ExternalService { .. } => 502,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) | Self::Other(_) => 500,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an unauthorized error.
    #[must_use]
    pub fn unauthorized<T: Into<String>>(message: T) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is transient.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::ExternalService { .. } | Self::Timeout(_)
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for OpsError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound {
                resource_type: "database_row",
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                // MySQL duplicate key
                if db_err.code().as_deref() == Some("23000") || db_err.message().contains("Duplicate entry") {
                    return Self::Conflict(db_err.message().to_string());
                }
                Self::Database(err.to_string())
            }
            sqlx::Error::PoolTimedOut => Self::Timeout("database pool".to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Serializable error response for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request trace ID for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response from an `OpsError`.
    #[must_use]
    pub fn from_error(error: &OpsError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            trace_id: None,
        }
    }

    /// Sets the trace ID.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

impl From<&OpsError> for ErrorResponse {
    fn from(error: &OpsError) -> Self {
        Self::from_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(OpsError::not_found("HealthRecord", "queue/admin").status_code(), 404);
        assert_eq!(OpsError::validation("batch size").status_code(), 400);
        assert_eq!(OpsError::unauthorized("missing token").status_code(), 401);
        assert_eq!(OpsError::Conflict("dup".to_string()).status_code(), 409);
        assert_eq!(OpsError::Database("db error".to_string()).status_code(), 500);
        assert_eq!(OpsError::Timeout("pool".to_string()).status_code(), 503);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(OpsError::not_found("Job", 1).error_code(), "NOT_FOUND");
        assert_eq!(OpsError::configuration("bad").error_code(), "CONFIGURATION_ERROR");
        assert_eq!(OpsError::internal("err").error_code(), "INTERNAL_ERROR");
        assert_eq!(
            OpsError::ExternalService {
                service: "webhook".to_string(),
                message: "502".to_string()
            }
            .error_code(),
            "EXTERNAL_SERVICE_ERROR"
        );
    }

    #[test]
    fn test_retriable_errors() {
        assert!(OpsError::Database("connection lost".to_string()).is_retriable());
        assert!(OpsError::Timeout("request timed out".to_string()).is_retriable());
        assert!(!OpsError::validation("bad input").is_retriable());
        assert!(!OpsError::unauthorized("no auth").is_retriable());
    }

    #[test]
    fn test_error_display() {
        let err = OpsError::not_found("Job", 42);
        assert_eq!(err.to_string(), "Resource not found: Job with id 42");
    }

    #[test]
    fn test_error_response_from_error() {
        let err = OpsError::validation("batch_size must be positive");
        let response = ErrorResponse::from_error(&err).with_trace_id("trace-1");
        assert_eq!(response.code, "VALIDATION_ERROR");
        assert!(response.message.contains("batch_size"));
        assert_eq!(response.trace_id.as_deref(), Some("trace-1"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: OpsError = json_err.into();
        assert!(matches!(err, OpsError::Internal(_)));
    }

    #[test]
    fn test_from_anyhow() {
        let err: OpsError = anyhow::anyhow!("boom").into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "boom");
    }
}

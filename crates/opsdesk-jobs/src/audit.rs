//! Audit trail for executed actions.
//!
//! Audit entries are written after the job's state transition, outside its
//! transaction. A failed write is logged and counted, never surfaced.

use crate::job::{ActionJob, ActionType, JobId};
use crate::metrics::ProcessorMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsdesk_core::{CorrelationId, Interface, RequesterId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Audit write failure.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Database error.
    #[error("Audit database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Any other failure.
    #[error("Audit error: {0}")]
    Other(String),
}

/// How an attempt ended, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Completed,
    Retrying,
    Failed,
}

impl AuditOutcome {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Completed => "completed",
            AuditOutcome::Retrying => "retrying",
            AuditOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit trail line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub requester_id: RequesterId,
    pub action: ActionType,
    pub target: String,
    pub outcome: AuditOutcome,
    pub summary: String,
    pub job_id: JobId,
    pub correlation_id: CorrelationId,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Builds an entry for an attempt on `job`.
    pub fn for_job(
        job: &ActionJob,
        target: impl Into<String>,
        outcome: AuditOutcome,
        summary: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            requester_id: job.requester_id,
            action: job.action_type,
            target: target.into(),
            outcome,
            summary: summary.into(),
            job_id: job.id,
            correlation_id: job.correlation_id.clone(),
            recorded_at,
        }
    }
}

/// Destination for audit entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Interface {
    /// Appends one entry.
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Audit sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _entry: &AuditEntry) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Writes `entry`, logging instead of failing.
pub async fn record_best_effort(sink: &dyn AuditSink, entry: &AuditEntry) {
    if let Err(e) = sink.record(entry).await {
        ProcessorMetrics::audit_failure();
        warn!(
            job_id = %entry.job_id,
            action = %entry.action,
            outcome = %entry.outcome,
            error = %e,
            "Failed to write audit entry"
        );
    }
}

//! Invocation report: one line per selected job plus a summary.

use crate::alert::AlertOutcome;
use crate::health::HealthStatus;
use crate::job::{ActionType, JobId};
use crate::sweeper::SweepReport;
use opsdesk_core::CorrelationId;
use serde::Serialize;
use std::fmt;

/// What happened to one selected job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Handler succeeded and the completion committed.
    Completed,
    /// Handler failed; the job is PENDING again.
    Retrying { retry_count: u32, max_retries: u32 },
    /// Handler failed on its last attempt; the job is FAILED.
    Failed { retry_count: u32 },
    /// Not claimed: another invocation won.
    Skipped,
    /// The store failed before the handler ran (claim or opening the unit of
    /// work). The job is left for the sweeper and does not count against the
    /// failure rate.
    StoreError,
    /// The claim was superseded while the handler ran; nothing was recorded.
    Superseded,
    /// The outcome could not be persisted; the sweeper will return the job.
    Unrecorded,
}

impl JobOutcome {
    /// Returns true if the handler ran and succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed)
    }

    /// Returns true if the handler ran (or the outcome was lost) and counts
    /// against the failure rate.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobOutcome::Retrying { .. } | JobOutcome::Failed { .. } | JobOutcome::Unrecorded
        )
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Completed => f.write_str("completed"),
            JobOutcome::Retrying {
                retry_count,
                max_retries,
            } => write!(f, "retrying ({}/{})", retry_count, max_retries),
            JobOutcome::Failed { retry_count } => write!(f, "failed after {} attempts", retry_count),
            JobOutcome::Skipped => f.write_str("skipped"),
            JobOutcome::StoreError => f.write_str("store error"),
            JobOutcome::Superseded => f.write_str("superseded"),
            JobOutcome::Unrecorded => f.write_str("unrecorded"),
        }
    }
}

/// Per-job line of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobLine {
    pub job_id: JobId,
    pub correlation_id: CorrelationId,
    pub action_type: ActionType,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    /// Error or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

impl fmt::Display for JobLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job {} [{}] {} in {} ms",
            self.job_id, self.action_type, self.outcome, self.duration_ms
        )?;
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

/// Totals for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Jobs that never reached their handler because the store failed.
    pub store_errors: u64,
    pub sweep: SweepReport,
    pub health: HealthStatus,
    pub failure_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<u64>,
    pub alert: AlertOutcome,
    pub duration_ms: u64,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} actions: {} succeeded, {} failed, {} skipped; swept {} stuck, {} expired; health {} ({:.1}% failure rate)",
            self.processed,
            self.succeeded,
            self.failed,
            self.skipped,
            self.sweep.recovered,
            self.sweep.expired,
            self.health,
            self.failure_rate * 100.0
        )?;
        if self.store_errors > 0 {
            write!(f, "; {} store errors", self.store_errors)?;
        }
        if let Some(pending) = self.pending {
            write!(f, "; {} pending", pending)?;
        }
        if self.alert == AlertOutcome::Sent {
            f.write_str("; alert sent")?;
        } else if self.alert == AlertOutcome::Failed {
            f.write_str("; alert failed")?;
        }
        write!(f, "; {} ms", self.duration_ms)
    }
}

/// Result of one processor invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub jobs: Vec<JobLine>,
    pub summary: BatchSummary,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.jobs {
            writeln!(f, "{}", line)?;
        }
        write!(f, "{}", self.summary)
    }
}

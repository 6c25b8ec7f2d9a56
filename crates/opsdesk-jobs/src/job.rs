//! Job definitions: the persisted action record and its vocabulary.

use chrono::{DateTime, Utc};
use opsdesk_core::{CorrelationId, RequesterId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Internal identifier of a queued action (auto-increment key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Returns the raw key.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The closed set of deferred administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Change one or more site settings.
    SettingsUpdate,
    /// Create or edit a CMS page.
    PageUpdate,
    /// Enable or disable a feature module.
    ModuleToggle,
    /// Write payroll lines for a period.
    PayrollUpdate,
    /// Recompute gross amounts for a payroll period.
    PayrollRecalculation,
    /// Patch SEO metadata for a path.
    SeoUpdate,
}

impl ActionType {
    /// Every action type, in declaration order.
    pub const ALL: [ActionType; 6] = [
        ActionType::SettingsUpdate,
        ActionType::PageUpdate,
        ActionType::ModuleToggle,
        ActionType::PayrollUpdate,
        ActionType::PayrollRecalculation,
        ActionType::SeoUpdate,
    ];

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SettingsUpdate => "settings_update",
            ActionType::PageUpdate => "page_update",
            ActionType::ModuleToggle => "module_toggle",
            ActionType::PayrollUpdate => "payroll_update",
            ActionType::PayrollRecalculation => "payroll_recalculation",
            ActionType::SeoUpdate => "seo_update",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown action type '{}'", s))
    }
}

/// Job status.
///
/// ```text
/// PENDING ──claim──▶ PROCESSING ──▶ COMPLETED
///    ▲                   │  └─────▶ FAILED ──┐
///    └──retry / sweep────┘                   ▼
/// PENDING ─────────────expire──────────▶ EXPIRED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed.
    #[default]
    Pending,
    /// Claimed by an invocation.
    Processing,
    /// Handler succeeded and the outcome was committed.
    Completed,
    /// Retries exhausted.
    Failed,
    /// Too old to run.
    Expired,
}

impl JobStatus {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
        }
    }

    /// Returns true if no further transition is allowed out of this status,
    /// except the FAILED → EXPIRED housekeeping move.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Expired)
    }

    /// Returns true if the state machine permits `self → next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (*self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Pending)
                | (Processing, Failed)
                | (Pending, Expired)
                | (Failed, Expired)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "expired" => Ok(JobStatus::Expired),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A durable record of one deferred administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionJob {
    pub id: JobId,
    pub correlation_id: CorrelationId,
    pub action_type: ActionType,
    pub payload: JsonValue,
    pub priority: i32,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub requester_id: RequesterId,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
}

impl ActionJob {
    /// Creates a PENDING job with default priority and three attempts.
    ///
    /// The id is assigned by the store on insert; `JobId(0)` is a placeholder.
    pub fn new(action_type: ActionType, payload: JsonValue) -> Self {
        Self {
            id: JobId(0),
            correlation_id: CorrelationId::new(),
            action_type,
            payload,
            priority: 0,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries: 3,
            requester_id: RequesterId(0),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
        }
    }

    /// Sets the priority (higher runs first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the per-job attempt limit.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the requesting administrator.
    pub fn with_requester(mut self, requester_id: i64) -> Self {
        self.requester_id = RequesterId(requester_id);
        self
    }

    /// Overrides the creation time.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sets the status, for seeding jobs in a given state.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets `started_at`, for seeding jobs that are mid-flight.
    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Sets the number of attempts already made.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Attempt limit after applying the invocation-wide cap.
    pub fn effective_max_retries(&self, cap: u32) -> u32 {
        self.max_retries.min(cap)
    }

    /// Returns true if the job is eligible for batch selection.
    pub fn is_selectable(&self, cap: u32) -> bool {
        self.status == JobStatus::Pending && self.retry_count < self.effective_max_retries(cap)
    }

    /// Context handed to the handler for this attempt.
    pub fn requester_context(&self) -> RequesterContext {
        RequesterContext {
            requester_id: self.requester_id,
            job_id: self.id,
            correlation_id: self.correlation_id.clone(),
            attempt: self.retry_count + 1,
            requested_at: self.created_at,
        }
    }
}

/// Who asked for the action, passed explicitly into every handler call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterContext {
    pub requester_id: RequesterId,
    pub job_id: JobId,
    pub correlation_id: CorrelationId,
    /// 1-based attempt number.
    pub attempt: u32,
    pub requested_at: DateTime<Utc>,
}

/// Successful handler result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// What was changed, for the audit trail (e.g. `site_settings:site.name`).
    pub target: String,
    /// Stored in the job's `result` column.
    pub result: JsonValue,
}

impl ActionOutcome {
    /// Creates an outcome.
    pub fn new(target: impl Into<String>, result: JsonValue) -> Self {
        Self {
            target: target.into(),
            result,
        }
    }
}

//! Prometheus metrics for the admin action processor.
//!
//! Recorded through the `metrics` facade; nothing is exported unless a
//! recorder is installed (the server installs the Prometheus one).

use crate::job::ActionType;
use crate::health::HealthStatus;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names for the processor.
pub mod names {
    /// Total jobs claimed.
    pub const ACTIONS_CLAIMED_TOTAL: &str = "opsdesk_actions_claimed_total";
    /// Total claims lost to another invocation.
    pub const ACTIONS_CLAIM_CONFLICTS_TOTAL: &str = "opsdesk_actions_claim_conflicts_total";
    /// Total jobs completed successfully.
    pub const ACTIONS_COMPLETED_TOTAL: &str = "opsdesk_actions_completed_total";
    /// Total attempts that failed.
    pub const ACTIONS_FAILED_TOTAL: &str = "opsdesk_actions_failed_total";
    /// Total jobs returned to PENDING for another attempt.
    pub const ACTIONS_RETRIED_TOTAL: &str = "opsdesk_actions_retried_total";
    /// Total jobs moved to FAILED.
    pub const ACTIONS_EXHAUSTED_TOTAL: &str = "opsdesk_actions_exhausted_total";
    /// Total stuck jobs recovered by the sweeper.
    pub const ACTIONS_RECOVERED_TOTAL: &str = "opsdesk_actions_recovered_total";
    /// Total jobs expired by the sweeper.
    pub const ACTIONS_EXPIRED_TOTAL: &str = "opsdesk_actions_expired_total";

    /// Current PENDING depth.
    pub const ACTIONS_PENDING: &str = "opsdesk_actions_pending";
    /// Failure rate of the last batch.
    pub const BATCH_FAILURE_RATE: &str = "opsdesk_batch_failure_rate";
    /// Health status of the last batch (0 healthy, 1 warning, 2 critical).
    pub const QUEUE_HEALTH_STATUS: &str = "opsdesk_queue_health_status";

    /// Handler execution duration in seconds.
    pub const ACTION_DURATION_SECONDS: &str = "opsdesk_action_duration_seconds";
    /// Whole invocation duration in seconds.
    pub const BATCH_DURATION_SECONDS: &str = "opsdesk_batch_duration_seconds";

    /// Total alerts sent.
    pub const ALERTS_SENT_TOTAL: &str = "opsdesk_alerts_sent_total";
    /// Total alerts that could not be delivered.
    pub const ALERTS_FAILED_TOTAL: &str = "opsdesk_alerts_failed_total";
    /// Total audit writes that failed.
    pub const AUDIT_FAILURES_TOTAL: &str = "opsdesk_audit_failures_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    // Job counters
    describe_counter!(names::ACTIONS_CLAIMED_TOTAL, "Total number of actions claimed");
    describe_counter!(
        names::ACTIONS_CLAIM_CONFLICTS_TOTAL,
        "Total number of claims lost to a concurrent invocation"
    );
    describe_counter!(
        names::ACTIONS_COMPLETED_TOTAL,
        "Total number of actions completed successfully"
    );
    describe_counter!(names::ACTIONS_FAILED_TOTAL, "Total number of failed attempts");
    describe_counter!(names::ACTIONS_RETRIED_TOTAL, "Total number of actions queued for retry");
    describe_counter!(
        names::ACTIONS_EXHAUSTED_TOTAL,
        "Total number of actions that exhausted their retries"
    );
    describe_counter!(
        names::ACTIONS_RECOVERED_TOTAL,
        "Total number of stuck actions returned to pending"
    );
    describe_counter!(names::ACTIONS_EXPIRED_TOTAL, "Total number of actions expired");

    // Queue gauges
    describe_gauge!(names::ACTIONS_PENDING, "Current number of pending actions");
    describe_gauge!(names::BATCH_FAILURE_RATE, "Failure rate of the most recent batch");
    describe_gauge!(
        names::QUEUE_HEALTH_STATUS,
        "Queue health of the most recent batch (0 healthy, 1 warning, 2 critical)"
    );

    // Duration histograms
    describe_histogram!(names::ACTION_DURATION_SECONDS, "Action handler duration in seconds");
    describe_histogram!(names::BATCH_DURATION_SECONDS, "Processor invocation duration in seconds");

    // Side channels
    describe_counter!(names::ALERTS_SENT_TOTAL, "Total number of alerts delivered");
    describe_counter!(names::ALERTS_FAILED_TOTAL, "Total number of alerts that failed to send");
    describe_counter!(names::AUDIT_FAILURES_TOTAL, "Total number of failed audit writes");
}

/// Processor metrics recorder.
#[derive(Clone)]
pub struct ProcessorMetrics;

impl ProcessorMetrics {
    /// Record a successful claim.
    pub fn claimed() {
        counter!(names::ACTIONS_CLAIMED_TOTAL).increment(1);
    }

    /// Record a lost claim.
    pub fn claim_conflict() {
        counter!(names::ACTIONS_CLAIM_CONFLICTS_TOTAL).increment(1);
    }

    /// Record what a sweep changed.
    pub fn sweep(recovered: u64, expired: u64) {
        counter!(names::ACTIONS_RECOVERED_TOTAL).increment(recovered);
        counter!(names::ACTIONS_EXPIRED_TOTAL).increment(expired);
    }

    /// Record a completed action.
    pub fn completed(action: ActionType, duration: Duration) {
        counter!(
            names::ACTIONS_COMPLETED_TOTAL,
            "action_type" => action.as_str()
        )
        .increment(1);

        histogram!(
            names::ACTION_DURATION_SECONDS,
            "action_type" => action.as_str(),
            "status" => "completed"
        )
        .record(duration.as_secs_f64());
    }

    /// Record a failed attempt.
    pub fn failed(action: ActionType, error_kind: &str, duration: Duration) {
        counter!(
            names::ACTIONS_FAILED_TOTAL,
            "action_type" => action.as_str(),
            "error_kind" => error_kind.to_string()
        )
        .increment(1);

        histogram!(
            names::ACTION_DURATION_SECONDS,
            "action_type" => action.as_str(),
            "status" => "failed"
        )
        .record(duration.as_secs_f64());
    }

    /// Record a job sent back for another attempt.
    pub fn retried(action: ActionType, attempt: u32) {
        counter!(
            names::ACTIONS_RETRIED_TOTAL,
            "action_type" => action.as_str(),
            "attempt" => attempt.to_string()
        )
        .increment(1);
    }

    /// Record a job that exhausted its retries.
    pub fn exhausted(action: ActionType) {
        counter!(
            names::ACTIONS_EXHAUSTED_TOTAL,
            "action_type" => action.as_str()
        )
        .increment(1);
    }

    /// Update the queue health gauges after a batch.
    pub fn batch_health(status: HealthStatus, failure_rate: f64, pending: Option<u64>) {
        let level = match status {
            HealthStatus::Healthy => 0.0,
            HealthStatus::Warning => 1.0,
            HealthStatus::Critical => 2.0,
        };
        gauge!(names::QUEUE_HEALTH_STATUS).set(level);
        gauge!(names::BATCH_FAILURE_RATE).set(failure_rate);
        if let Some(pending) = pending {
            gauge!(names::ACTIONS_PENDING).set(pending as f64);
        }
    }

    /// Record the duration of a whole invocation.
    pub fn batch_duration(duration: Duration) {
        histogram!(names::BATCH_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Record an alert delivery attempt.
    pub fn alert(sink: &'static str, delivered: bool) {
        if delivered {
            counter!(names::ALERTS_SENT_TOTAL, "sink" => sink).increment(1);
        } else {
            counter!(names::ALERTS_FAILED_TOTAL, "sink" => sink).increment(1);
        }
    }

    /// Record a failed audit write.
    pub fn audit_failure() {
        counter!(names::AUDIT_FAILURES_TOTAL).increment(1);
    }
}

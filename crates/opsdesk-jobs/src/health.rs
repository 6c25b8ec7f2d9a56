//! Queue health classification and reporting.
//!
//! Each invocation classifies its own failure rate and overwrites the single
//! health record it owns, keyed by `(check_type, check_name)`.

use crate::error::JobResult;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Health status of the action queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HEALTHY" => Ok(HealthStatus::Healthy),
            "WARNING" => Ok(HealthStatus::Warning),
            "CRITICAL" => Ok(HealthStatus::Critical),
            other => Err(format!("unknown health status '{}'", other)),
        }
    }
}

/// Failure-rate thresholds. A rate strictly above a threshold trips it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            warning: 0.05,
            critical: 0.10,
        }
    }
}

/// Failure rate of a batch; zero when nothing was processed.
pub fn failure_rate(success: u64, failure: u64) -> f64 {
    let processed = success + failure;
    if processed == 0 {
        0.0
    } else {
        failure as f64 / processed as f64
    }
}

/// Classifies a batch outcome. Pure.
pub fn classify(success: u64, failure: u64, thresholds: &HealthThresholds) -> HealthStatus {
    let rate = failure_rate(success, failure);
    if rate > thresholds.critical {
        HealthStatus::Critical
    } else if rate > thresholds.warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Outcome counts for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    /// Jobs whose handler ran (`succeeded + failed`).
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Jobs selected but not run (lost claim or superseded).
    pub skipped: u64,
    /// Jobs not run because the store failed before the handler started.
    #[serde(default)]
    pub store_errors: u64,
}

impl BatchCounts {
    /// Records a success.
    pub fn success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    /// Records a failure.
    pub fn failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    /// Records a skipped job.
    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    /// Records a job the store kept from reaching its handler.
    pub fn store_error(&mut self) {
        self.store_errors += 1;
    }

    /// Failure rate of this batch.
    pub fn failure_rate(&self) -> f64 {
        failure_rate(self.succeeded, self.failed)
    }
}

/// The singleton health row for the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub check_type: String,
    pub check_name: String,
    pub status: HealthStatus,
    pub message: String,
    pub details: JsonValue,
    pub checked_at: DateTime<Utc>,
}

/// Result of one health report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub record: HealthRecord,
    pub failure_rate: f64,
    /// PENDING depth, if the store could be asked.
    pub pending: Option<u64>,
    /// Whether the record was written.
    pub persisted: bool,
}

/// Computes and persists the queue health record.
pub struct HealthReporter<S: JobStore> {
    store: Arc<S>,
    thresholds: HealthThresholds,
    check_type: String,
    check_name: String,
}

impl<S: JobStore> HealthReporter<S> {
    /// Creates a reporter for the record `(check_type, check_name)`.
    pub fn new(
        store: Arc<S>,
        thresholds: HealthThresholds,
        check_type: impl Into<String>,
        check_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            thresholds,
            check_type: check_type.into(),
            check_name: check_name.into(),
        }
    }

    /// Classifies `counts`, reads the PENDING depth and upserts the record.
    ///
    /// Store failures are logged; the returned report says what was written.
    pub async fn report(&self, counts: &BatchCounts, now: DateTime<Utc>) -> HealthReport {
        let pending = match self.store.pending_count().await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Failed to read pending queue depth");
                None
            }
        };

        let record = self.build_record(counts, pending, now);
        let persisted = match self.persist(&record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    check_type = %record.check_type,
                    check_name = %record.check_name,
                    error = %e,
                    "Failed to write health record"
                );
                false
            }
        };

        info!(
            status = %record.status,
            processed = counts.processed,
            failed = counts.failed,
            pending = ?pending,
            "Queue health recorded"
        );

        HealthReport {
            failure_rate: counts.failure_rate(),
            record,
            pending,
            persisted,
        }
    }

    async fn persist(&self, record: &HealthRecord) -> JobResult<()> {
        self.store.upsert_health(record).await
    }

    fn build_record(&self, counts: &BatchCounts, pending: Option<u64>, now: DateTime<Utc>) -> HealthRecord {
        let rate = counts.failure_rate();
        let status = classify(counts.succeeded, counts.failed, &self.thresholds);

        let pending_text = pending.map_or_else(|| "unknown".to_string(), |n| n.to_string());
        let message = if counts.processed == 0 {
            format!("No actions processed; {} pending", pending_text)
        } else {
            format!(
                "Processed {} actions: {} succeeded, {} failed ({:.1}% failure rate); {} pending",
                counts.processed,
                counts.succeeded,
                counts.failed,
                rate * 100.0,
                pending_text
            )
        };

        HealthRecord {
            check_type: self.check_type.clone(),
            check_name: self.check_name.clone(),
            status,
            message,
            details: json!({
                "processed": counts.processed,
                "success": counts.succeeded,
                "failure": counts.failed,
                "skipped": counts.skipped,
                "store_errors": counts.store_errors,
                "failure_rate": rate,
                "pending_count": pending,
                "thresholds": {
                    "warning": self.thresholds.warning,
                    "critical": self.thresholds.critical,
                },
            }),
            checked_at: now,
        }
    }
}

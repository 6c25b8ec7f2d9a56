//! Job store abstraction.
//!
//! Every mutation here is a single conditional statement against the store.
//! No operation reads a row and then writes it in a second round trip; that
//! is what keeps overlapping invocations safe without cross-statement locks.

use crate::error::JobResult;
use crate::health::HealthRecord;
use crate::job::{ActionJob, JobId};
use crate::retry::FailureDisposition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Durable storage for action jobs and the queue health record.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Unit of work in which handlers run and jobs complete.
    type Unit: UnitOfWork;

    /// Verifies the store is reachable.
    async fn ping(&self) -> JobResult<()>;

    /// PROCESSING jobs with `started_at < cutoff` go back to PENDING with
    /// `started_at` cleared. Returns the number of jobs reset.
    async fn recover_stuck(&self, cutoff: DateTime<Utc>) -> JobResult<u64>;

    /// PENDING and FAILED jobs with `created_at < cutoff` become EXPIRED.
    /// Returns the number of jobs expired.
    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> JobResult<u64>;

    /// Up to `limit` PENDING jobs with `retry_count < min(max_retries, retry_cap)`,
    /// ordered by priority descending, then `created_at` ascending.
    async fn select_batch(&self, limit: u32, retry_cap: u32) -> JobResult<Vec<ActionJob>>;

    /// Atomically moves the job PENDING → PROCESSING, stamping `started_at = now`.
    ///
    /// Returns `false` if the job was no longer PENDING at write time.
    async fn claim(&self, id: JobId, now: DateTime<Utc>) -> JobResult<bool>;

    /// Opens a unit of work.
    async fn begin(&self) -> JobResult<Self::Unit>;

    /// Records a failed attempt on a job this invocation claimed.
    ///
    /// Conditional on the job still being PROCESSING under this claim (same
    /// `started_at` and `retry_count` as `claimed`). Returns `false` if the
    /// claim was superseded.
    async fn record_failure(
        &self,
        claimed: &ActionJob,
        disposition: &FailureDisposition,
        error: &str,
        now: DateTime<Utc>,
    ) -> JobResult<bool>;

    /// Number of PENDING jobs.
    async fn pending_count(&self) -> JobResult<u64>;

    /// Inserts or overwrites the record keyed by `(check_type, check_name)`.
    async fn upsert_health(&self, record: &HealthRecord) -> JobResult<()>;

    /// Reads a health record.
    async fn latest_health(&self, check_type: &str, check_name: &str) -> JobResult<Option<HealthRecord>>;
}

/// An open transaction scoped to one job.
///
/// Handler side effects and the COMPLETED transition are made through the
/// same unit, so they commit or roll back together.
#[async_trait]
pub trait UnitOfWork: Send + Sized + 'static {
    /// Marks the claimed job COMPLETED with its result.
    ///
    /// Conditional on the job still being PROCESSING under this claim.
    /// Returns `false` if the claim was superseded.
    async fn complete(&mut self, claimed: &ActionJob, result: &JsonValue, now: DateTime<Utc>) -> JobResult<bool>;

    /// Commits everything done in this unit.
    async fn commit(self) -> JobResult<()>;

    /// Discards everything done in this unit.
    async fn rollback(self) -> JobResult<()>;
}

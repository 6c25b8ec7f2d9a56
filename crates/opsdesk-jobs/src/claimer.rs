//! Batch selection and exclusive claiming.

use crate::error::JobResult;
use crate::job::{ActionJob, JobStatus};
use crate::metrics::ProcessorMetrics;
use crate::store::JobStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of trying to claim one selected job.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// This invocation owns the job; the snapshot reflects the claim.
    Claimed(ActionJob),
    /// Another invocation got there first.
    Lost,
    /// The store failed during the claim; the job is left as it was.
    Errored(String),
}

/// Selects eligible jobs and claims them one at a time.
pub struct Claimer<S: JobStore> {
    store: Arc<S>,
    retry_cap: u32,
}

impl<S: JobStore> Claimer<S> {
    /// Creates a claimer that honours `retry_cap` on top of each job's limit.
    pub fn new(store: Arc<S>, retry_cap: u32) -> Self {
        Self { store, retry_cap }
    }

    /// Up to `limit` PENDING jobs, priority first, then oldest first.
    pub async fn select_batch(&self, limit: u32) -> JobResult<Vec<ActionJob>> {
        let batch = self.store.select_batch(limit, self.retry_cap).await?;
        debug!(selected = batch.len(), limit, "Selected pending actions");
        Ok(batch)
    }

    /// Attempts the PENDING → PROCESSING transition for `job`.
    pub async fn claim(&self, job: &ActionJob, now: DateTime<Utc>) -> ClaimOutcome {
        match self.store.claim(job.id, now).await {
            Ok(true) => {
                ProcessorMetrics::claimed();
                let mut claimed = job.clone();
                claimed.status = JobStatus::Processing;
                claimed.started_at = Some(now);
                ClaimOutcome::Claimed(claimed)
            }
            Ok(false) => {
                debug!(job_id = %job.id, "Claim lost to another invocation");
                ProcessorMetrics::claim_conflict();
                ClaimOutcome::Lost
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Claim failed");
                ClaimOutcome::Errored(e.to_string())
            }
        }
    }
}

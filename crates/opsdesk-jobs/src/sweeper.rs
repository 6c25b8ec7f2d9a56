//! Stuck-job recovery and expiry.

use crate::error::JobResult;
use crate::metrics::ProcessorMetrics;
use crate::store::JobStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What one sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// PROCESSING jobs returned to PENDING.
    pub recovered: u64,
    /// PENDING or FAILED jobs moved to EXPIRED.
    pub expired: u64,
}

/// Runs the two housekeeping updates before batch selection.
pub struct Sweeper<S: JobStore> {
    store: Arc<S>,
    lock_timeout: Duration,
    expire_after: Duration,
}

impl<S: JobStore> Sweeper<S> {
    /// Creates a sweeper.
    pub fn new(store: Arc<S>, lock_timeout: Duration, expire_after: Duration) -> Self {
        Self {
            store,
            lock_timeout,
            expire_after,
        }
    }

    /// Recovers stuck jobs, then expires stale ones.
    ///
    /// Recovery runs first so a job that is both stuck and old is still
    /// expired in the same pass rather than becoming claimable.
    pub async fn sweep(&self, now: DateTime<Utc>) -> JobResult<SweepReport> {
        let recovered = self.store.recover_stuck(now - self.lock_timeout).await?;
        let expired = self.store.expire_stale(now - self.expire_after).await?;

        if recovered > 0 || expired > 0 {
            info!(recovered, expired, "Sweep reset stuck jobs and expired stale jobs");
        } else {
            debug!("Sweep found nothing to do");
        }
        ProcessorMetrics::sweep(recovered, expired);

        Ok(SweepReport { recovered, expired })
    }
}

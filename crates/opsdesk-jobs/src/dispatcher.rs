//! Runs a claimed job's handler and records the outcome.

use crate::audit::{record_best_effort, AuditEntry, AuditOutcome, AuditSink, NoopAuditSink};
use crate::clock;
use crate::error::HandlerError;
use crate::handler::HandlerRegistry;
use crate::job::{ActionJob, ActionOutcome};
use crate::metrics::ProcessorMetrics;
use crate::report::JobOutcome;
use crate::retry::{FailureDisposition, RetryPolicy};
use crate::store::{JobStore, UnitOfWork};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of dispatching one claimed job.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub outcome: JobOutcome,
    /// Handler error or persistence problem, if any.
    pub detail: Option<String>,
    pub duration: Duration,
}

/// Executes claimed jobs through the handler registry.
///
/// The handler and the COMPLETED transition share one unit of work. A failed
/// handler's unit is rolled back before the retry or terminal failure is
/// written, so no partial side effects survive a failed attempt.
pub struct Dispatcher<S: JobStore> {
    store: Arc<S>,
    registry: HandlerRegistry<S::Unit>,
    retry: RetryPolicy,
    audit: Arc<dyn AuditSink>,
}

impl<S: JobStore> Dispatcher<S> {
    /// Creates a dispatcher with no audit trail.
    pub fn new(store: Arc<S>, registry: HandlerRegistry<S::Unit>, retry: RetryPolicy) -> Self {
        Self {
            store,
            registry,
            retry,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Sets the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// The handler registry.
    pub fn registry(&self) -> &HandlerRegistry<S::Unit> {
        &self.registry
    }

    /// Runs `claimed` (a snapshot taken at claim time) to a recorded outcome.
    pub async fn dispatch(&self, claimed: &ActionJob) -> Dispatched {
        let started = Instant::now();

        let mut unit = match self.store.begin().await {
            Ok(unit) => unit,
            Err(e) => {
                warn!(job_id = %claimed.id, error = %e, "Failed to open unit of work; leaving job for the sweeper");
                return Dispatched {
                    outcome: JobOutcome::StoreError,
                    detail: Some(format!("unit of work unavailable: {}", e)),
                    duration: started.elapsed(),
                };
            }
        };

        let result = match self.registry.get(claimed.action_type) {
            Some(handler) => {
                handler
                    .handle(&mut unit, &claimed.payload, &claimed.requester_context())
                    .await
            }
            None => Err(HandlerError::NoHandler(claimed.action_type)),
        };

        let (outcome, detail) = match result {
            Ok(outcome) => self.complete(claimed, unit, outcome, started).await,
            Err(err) => {
                rollback(unit, claimed).await;
                self.fail(claimed, err, started).await
            }
        };

        Dispatched {
            outcome,
            detail,
            duration: started.elapsed(),
        }
    }

    async fn complete(
        &self,
        claimed: &ActionJob,
        mut unit: S::Unit,
        outcome: ActionOutcome,
        started: Instant,
    ) -> (JobOutcome, Option<String>) {
        let now = clock::now();
        match unit.complete(claimed, &outcome.result, now).await {
            Ok(true) => {}
            Ok(false) => {
                rollback(unit, claimed).await;
                warn!(job_id = %claimed.id, "Claim superseded before completion; discarding handler effects");
                return (JobOutcome::Superseded, Some("claim superseded".to_string()));
            }
            Err(e) => {
                rollback(unit, claimed).await;
                warn!(job_id = %claimed.id, error = %e, "Failed to mark job completed; leaving job for the sweeper");
                return (JobOutcome::Unrecorded, Some(e.to_string()));
            }
        }

        if let Err(e) = unit.commit().await {
            warn!(job_id = %claimed.id, error = %e, "Commit failed; leaving job for the sweeper");
            return (JobOutcome::Unrecorded, Some(e.to_string()));
        }

        ProcessorMetrics::completed(claimed.action_type, started.elapsed());
        info!(job_id = %claimed.id, target = %outcome.target, "Action completed");

        let summary = format!("completed on attempt {}", claimed.retry_count + 1);
        self.audit(claimed, &outcome.target, AuditOutcome::Completed, summary).await;
        (JobOutcome::Completed, None)
    }

    async fn fail(&self, claimed: &ActionJob, err: HandlerError, started: Instant) -> (JobOutcome, Option<String>) {
        let message = err.to_string();
        ProcessorMetrics::failed(claimed.action_type, err.kind(), started.elapsed());

        let disposition = self.retry.decide(claimed);
        match self
            .store
            .record_failure(claimed, &disposition, &message, clock::now())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id = %claimed.id, error = %message, "Claim superseded before failure was recorded");
                return (JobOutcome::Superseded, Some(message));
            }
            Err(e) => {
                warn!(
                    job_id = %claimed.id,
                    handler_error = %message,
                    error = %e,
                    "Failed to record job failure; leaving job for the sweeper"
                );
                return (JobOutcome::Unrecorded, Some(message));
            }
        }

        let (outcome, audit_outcome) = match disposition {
            FailureDisposition::Retry {
                retry_count,
                max_retries,
            } => {
                ProcessorMetrics::retried(claimed.action_type, retry_count);
                info!(job_id = %claimed.id, retry_count, max_retries, error = %message, "Action failed; will retry");
                (
                    JobOutcome::Retrying {
                        retry_count,
                        max_retries,
                    },
                    AuditOutcome::Retrying,
                )
            }
            FailureDisposition::Fail { retry_count } => {
                ProcessorMetrics::exhausted(claimed.action_type);
                warn!(job_id = %claimed.id, retry_count, error = %message, "Action failed permanently");
                (JobOutcome::Failed { retry_count }, AuditOutcome::Failed)
            }
        };

        self.audit(claimed, claimed.action_type.as_str(), audit_outcome, message.clone())
            .await;
        (outcome, Some(message))
    }

    async fn audit(&self, job: &ActionJob, target: &str, outcome: AuditOutcome, summary: String) {
        let entry = AuditEntry::for_job(job, target, outcome, summary, clock::now());
        record_best_effort(self.audit.as_ref(), &entry).await;
    }
}

async fn rollback<U: UnitOfWork>(unit: U, claimed: &ActionJob) {
    if let Err(e) = unit.rollback().await {
        debug!(job_id = %claimed.id, error = %e, "Rollback failed");
    }
}

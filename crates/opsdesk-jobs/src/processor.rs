//! One processor invocation: sweep, select, claim, dispatch, report.

use crate::alert::{AlertSink, Alerter, LogAlertSink};
use crate::audit::AuditSink;
use crate::claimer::{ClaimOutcome, Claimer};
use crate::clock;
use crate::config::ProcessorSettings;
use crate::dispatcher::Dispatcher;
use crate::error::{JobError, JobResult};
use crate::handler::HandlerRegistry;
use crate::health::{BatchCounts, HealthReporter};
use crate::job::ActionJob;
use crate::metrics::ProcessorMetrics;
use crate::report::{BatchReport, BatchSummary, JobLine, JobOutcome};
use crate::retry::RetryPolicy;
use crate::store::JobStore;
use crate::sweeper::Sweeper;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Drives a single synchronous pass over the queue.
///
/// Jobs are handled one after another. Overlapping invocations are safe
/// because every claim is an atomic conditional update; nothing else is
/// locked.
pub struct ActionProcessor<S: JobStore> {
    store: Arc<S>,
    settings: ProcessorSettings,
    sweeper: Sweeper<S>,
    claimer: Claimer<S>,
    dispatcher: Dispatcher<S>,
    health: HealthReporter<S>,
    alerter: Alerter,
}

impl<S: JobStore> ActionProcessor<S> {
    /// Creates a processor that alerts to the log and keeps no audit trail.
    pub fn new(store: Arc<S>, registry: HandlerRegistry<S::Unit>, settings: ProcessorSettings) -> Self {
        let missing = registry.missing();
        if !missing.is_empty() {
            warn!(?missing, "No handler registered for some action types; their jobs will fail");
        }

        Self {
            sweeper: Sweeper::new(Arc::clone(&store), settings.lock_timeout(), settings.expire_after()),
            claimer: Claimer::new(Arc::clone(&store), settings.max_retries),
            dispatcher: Dispatcher::new(Arc::clone(&store), registry, RetryPolicy::new(settings.max_retries)),
            health: HealthReporter::new(
                Arc::clone(&store),
                settings.thresholds,
                settings.health_check_type.clone(),
                settings.health_check_name.clone(),
            ),
            alerter: Alerter::new(Arc::new(LogAlertSink), "ops", settings.thresholds.critical),
            store,
            settings,
        }
    }

    /// Writes audit entries to `sink`, unless auditing is disabled.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        if self.settings.audit_enabled {
            self.dispatcher = self.dispatcher.with_audit(sink);
        }
        self
    }

    /// Sends critical-rate alerts to `sink` for `recipient`.
    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>, recipient: impl Into<String>, enabled: bool) -> Self {
        self.alerter = Alerter::new(sink, recipient, self.settings.thresholds.critical).enabled(enabled);
        self
    }

    /// Settings in effect.
    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    /// Runs one invocation.
    ///
    /// Returns `Err` only for failures that stop the pass before any job is
    /// touched: an unreachable store ([`JobError::Setup`]) or a failed sweep
    /// or batch selection. Per-job problems are reported in the batch.
    pub async fn run(&self) -> JobResult<BatchReport> {
        let started = Instant::now();

        self.store.ping().await.map_err(JobError::setup)?;

        let sweep = self.sweeper.sweep(clock::now()).await?;
        let batch = self.claimer.select_batch(self.settings.batch_size).await?;
        info!(selected = batch.len(), batch_size = self.settings.batch_size, "Processing admin actions");

        let mut counts = BatchCounts::default();
        let mut jobs = Vec::with_capacity(batch.len());
        for job in &batch {
            let span = info_span!("action_job", job_id = %job.id, action_type = %job.action_type);
            let line = self.process_one(job).instrument(span).await;

            match line.outcome {
                JobOutcome::StoreError => counts.store_error(),
                outcome if outcome.is_success() => counts.success(),
                outcome if outcome.is_failure() => counts.failure(),
                _ => counts.skip(),
            }
            jobs.push(line);
        }

        let health = self.health.report(&counts, clock::now()).await;
        ProcessorMetrics::batch_health(health.record.status, health.failure_rate, health.pending);
        let alert = self.alerter.check(&counts).await;

        let duration = started.elapsed();
        ProcessorMetrics::batch_duration(duration);

        let summary = BatchSummary {
            processed: counts.processed,
            succeeded: counts.succeeded,
            failed: counts.failed,
            skipped: counts.skipped,
            store_errors: counts.store_errors,
            sweep,
            health: health.record.status,
            failure_rate: health.failure_rate,
            pending: health.pending,
            alert,
            duration_ms: duration.as_millis() as u64,
        };
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            store_errors = summary.store_errors,
            health = %summary.health,
            duration_ms = summary.duration_ms,
            "Admin action batch finished"
        );

        Ok(BatchReport { jobs, summary })
    }

    async fn process_one(&self, job: &ActionJob) -> JobLine {
        let line = |outcome, detail, duration_ms| JobLine {
            job_id: job.id,
            correlation_id: job.correlation_id.clone(),
            action_type: job.action_type,
            outcome,
            detail,
            duration_ms,
        };

        match self.claimer.claim(job, clock::now()).await {
            ClaimOutcome::Claimed(claimed) => {
                let dispatched = self.dispatcher.dispatch(&claimed).await;
                line(
                    dispatched.outcome,
                    dispatched.detail,
                    dispatched.duration.as_millis() as u64,
                )
            }
            ClaimOutcome::Lost => line(JobOutcome::Skipped, Some("claimed by another invocation".to_string()), 0),
            ClaimOutcome::Errored(e) => line(JobOutcome::StoreError, Some(format!("claim failed: {}", e)), 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertOutcome, MockAlertSink};
    use crate::error::HandlerError;
    use crate::handler::ActionHandler;
    use crate::health::HealthStatus;
    use crate::job::{ActionOutcome, ActionType, JobStatus, RequesterContext};
    use crate::memory::{MemoryJobStore, MemoryUnit};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value as JsonValue};

    /// Fails when the payload says so.
    struct Scripted(ActionType);

    #[async_trait]
    impl ActionHandler<MemoryUnit> for Scripted {
        fn action_type(&self) -> ActionType {
            self.0
        }

        async fn handle(
            &self,
            unit: &mut MemoryUnit,
            payload: &JsonValue,
            _ctx: &RequesterContext,
        ) -> Result<ActionOutcome, HandlerError> {
            if payload["fail"].as_bool().unwrap_or(false) {
                return Err(HandlerError::failed("scripted failure"));
            }
            unit.record_effect(self.0.as_str(), payload.clone());
            Ok(ActionOutcome::new(self.0.as_str(), json!({"ok": true})))
        }
    }

    fn registry() -> HandlerRegistry<MemoryUnit> {
        ActionType::ALL
            .into_iter()
            .fold(HandlerRegistry::new(), |r, t| r.with(Scripted(t)))
    }

    fn processor(store: &Arc<MemoryJobStore>) -> ActionProcessor<MemoryJobStore> {
        ActionProcessor::new(Arc::clone(store), registry(), ProcessorSettings::default())
    }

    #[tokio::test]
    async fn test_empty_queue_is_healthy() {
        let store = Arc::new(MemoryJobStore::new());
        let report = processor(&store).run().await.unwrap();

        assert!(report.jobs.is_empty());
        assert_eq!(report.summary.processed, 0);
        assert_eq!(report.summary.health, HealthStatus::Healthy);
        assert_eq!(report.summary.alert, AlertOutcome::NotRequired);
        assert_eq!(store.health_records().len(), 1);
    }

    // A job that fails on every attempt is retried until FAILED, keeping its place.
    #[tokio::test]
    async fn test_failing_job_retries_then_fails() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.insert(ActionJob::new(ActionType::PayrollUpdate, json!({"fail": true})).with_max_retries(3));
        let created_at = store.get(id).unwrap().created_at;
        let processor = processor(&store);

        for expected in 1..=2 {
            processor.run().await.unwrap();
            let job = store.get(id).unwrap();
            assert_eq!(job.status, JobStatus::Pending);
            assert_eq!(job.retry_count, expected);
            assert_eq!(job.created_at, created_at);
        }

        let report = processor.run().await.unwrap();
        assert_eq!(report.jobs[0].outcome, JobOutcome::Failed { retry_count: 3 });
        let job = store.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.completed_at.is_some());

        // Never selected again.
        let after = processor.run().await.unwrap();
        assert!(after.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_ten_successful_jobs_complete_in_one_invocation() {
        let store = Arc::new(MemoryJobStore::new());
        for i in 0..10 {
            store.insert(ActionJob::new(ActionType::SettingsUpdate, json!({"key": i})));
        }

        let report = processor(&store).run().await.unwrap();

        assert_eq!(report.summary.processed, 10);
        assert_eq!(report.summary.succeeded, 10);
        assert_eq!(report.summary.failed, 0);
        assert_eq!(report.summary.health, HealthStatus::Healthy);
        assert_eq!(report.summary.pending, Some(0));
        assert_eq!(store.count_status(JobStatus::Completed), 10);
        assert_eq!(store.count_status(JobStatus::Pending), 0);
        assert_eq!(store.health_records()[0].status, HealthStatus::Healthy);
    }

    // Two of ten jobs fail on every attempt; the rest finish on the first pass.
    #[tokio::test]
    async fn test_mixed_batch_over_three_invocations() {
        let store = Arc::new(MemoryJobStore::new());
        let mut failing = Vec::new();
        for i in 0..10 {
            let fail = i % 5 == 0;
            let id = store.insert(
                ActionJob::new(ActionType::PayrollUpdate, json!({"fail": fail})).with_max_retries(3),
            );
            if fail {
                failing.push(id);
            }
        }
        let processor = processor(&store);

        let first = processor.run().await.unwrap();
        assert_eq!(first.summary.processed, 10);
        assert_eq!(first.summary.succeeded, 8);
        assert_eq!(first.summary.failed, 2);
        assert_eq!(first.summary.health, HealthStatus::Critical);
        assert_eq!(first.summary.pending, Some(2));
        assert_eq!(store.count_status(JobStatus::Completed), 8);

        for (invocation, expected_retries) in [(2, 2), (3, 3)] {
            let report = processor.run().await.unwrap();
            assert_eq!(report.summary.processed, 2, "invocation {}", invocation);
            assert_eq!(report.summary.failed, 2, "invocation {}", invocation);
            assert_eq!(store.count_status(JobStatus::Completed), 8);
            for id in &failing {
                assert_eq!(store.get(*id).unwrap().retry_count, expected_retries);
            }
        }

        for id in &failing {
            let job = store.get(*id).unwrap();
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.retry_count, 3);
            assert!(job.completed_at.is_some());
        }
        assert_eq!(store.count_status(JobStatus::Pending), 0);

        let after = processor.run().await.unwrap();
        assert!(after.jobs.is_empty());
        assert_eq!(after.summary.health, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_claim_store_errors_do_not_count_as_failures() {
        let store = Arc::new(MemoryJobStore::new());
        for _ in 0..3 {
            store.insert(ActionJob::new(ActionType::ModuleToggle, json!({})));
        }
        store.set_fail_claims(true);

        let report = processor(&store).run().await.unwrap();

        assert!(report.jobs.iter().all(|l| l.outcome == JobOutcome::StoreError));
        assert_eq!(report.summary.store_errors, 3);
        assert_eq!(report.summary.processed, 0);
        assert_eq!(report.summary.failed, 0);
        assert_eq!(report.summary.skipped, 0);
        assert_eq!(report.summary.health, HealthStatus::Healthy);
        assert!(report.summary.to_string().contains("3 store errors"));
        assert_eq!(store.count_status(JobStatus::Pending), 3);
    }

    #[tokio::test]
    async fn test_stuck_job_is_recovered_and_processed() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.insert(
            ActionJob::new(ActionType::ModuleToggle, json!({}))
                .with_status(JobStatus::Processing)
                .started_at(Utc::now() - Duration::minutes(10)),
        );

        let report = processor(&store).run().await.unwrap();
        assert_eq!(report.summary.sweep.recovered, 1);
        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(store.get(id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_expired_job_is_never_claimed() {
        let store = Arc::new(MemoryJobStore::new());
        let id = store.insert(ActionJob::new(ActionType::SeoUpdate, json!({})).created_at(Utc::now() - Duration::hours(25)));

        let report = processor(&store).run().await.unwrap();
        assert_eq!(report.summary.sweep.expired, 1);
        assert!(report.jobs.is_empty());
        assert_eq!(store.get(id).unwrap().status, JobStatus::Expired);
    }

    #[tokio::test]
    async fn test_critical_batch_sends_one_alert() {
        let store = Arc::new(MemoryJobStore::new());
        for i in 0..20 {
            let fail = i < 3;
            store.insert(ActionJob::new(ActionType::SettingsUpdate, json!({"fail": fail})));
        }

        let mut sink = MockAlertSink::new();
        sink.expect_name().return_const("mock");
        sink.expect_send()
            .withf(|_: &str, _: &str, body: &str| body.starts_with("3 of 20"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let report = processor(&store)
            .with_alert_sink(Arc::new(sink), "ops@example.com", true)
            .run()
            .await
            .unwrap();

        assert_eq!(report.summary.processed, 20);
        assert_eq!(report.summary.failed, 3);
        assert_eq!(report.summary.health, HealthStatus::Critical);
        assert_eq!(report.summary.alert, AlertOutcome::Sent);
        assert!((report.summary.failure_rate - 0.15).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_alert_failure_does_not_fail_batch() {
        let store = Arc::new(MemoryJobStore::new());
        store.insert(ActionJob::new(ActionType::SettingsUpdate, json!({"fail": true})));

        let mut sink = MockAlertSink::new();
        sink.expect_name().return_const("mock");
        sink.expect_send()
            .times(1)
            .returning(|_, _, _| Err(crate::alert::AlertError::Transport("smtp down".into())));

        let report = processor(&store)
            .with_alert_sink(Arc::new(sink), "ops", true)
            .run()
            .await
            .unwrap();
        assert_eq!(report.summary.alert, AlertOutcome::Failed);
        assert_eq!(report.summary.failed, 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_setup_error() {
        let store = Arc::new(MemoryJobStore::new());
        store.set_available(false);

        let err = processor(&store).run().await.unwrap_err();
        assert!(err.is_setup());
    }

    #[tokio::test]
    async fn test_priority_then_age_order_and_batch_bound() {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        let low = store.insert(ActionJob::new(ActionType::SeoUpdate, json!({})).created_at(now - Duration::minutes(3)));
        let high = store.insert(ActionJob::new(ActionType::SeoUpdate, json!({})).with_priority(10).created_at(now));
        let mid = store.insert(ActionJob::new(ActionType::SeoUpdate, json!({})).with_priority(5).created_at(now));

        let settings = ProcessorSettings {
            batch_size: 2,
            ..ProcessorSettings::default()
        };
        let report = ActionProcessor::new(Arc::clone(&store), registry(), settings)
            .run()
            .await
            .unwrap();

        let order: Vec<_> = report.jobs.iter().map(|l| l.job_id).collect();
        assert_eq!(order, vec![high, mid]);
        assert_eq!(store.get(low).unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_overlapping_invocations_process_each_job_once() {
        let store = Arc::new(MemoryJobStore::new());
        for _ in 0..30 {
            store.insert(ActionJob::new(ActionType::PageUpdate, json!({})));
        }

        let a = processor(&store);
        let b = processor(&store);
        let (ra, rb) = tokio::join!(a.run(), b.run());
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_eq!(ra.summary.succeeded + rb.summary.succeeded, 30);
        assert_eq!(store.count_status(JobStatus::Completed), 30);
        assert_eq!(store.committed_effects().len(), 30);
    }
}

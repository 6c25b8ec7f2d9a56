//! Integration tests for the MySQL job store and the built-in handlers.
//!
//! These tests use testcontainers to spin up a real MySQL database.
//! Run with: `cargo test -p opsdesk-jobs --test mysql_processor_test`

mod common;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::TestDatabase;
use opsdesk_jobs::handlers::mysql_registry;
use opsdesk_jobs::{
    clock, ActionHandler, ActionJob, ActionOutcome, ActionProcessor, ActionType, FailureDisposition, HandlerError,
    HandlerRegistry, JobOutcome, JobStatus, JobStore, MySqlAuditSink, MySqlJobStore, MySqlUnit, ProcessorSettings,
    RequesterContext, UnitOfWork,
};
use opsdesk_repository::mysql::{feature_modules, payroll, settings};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

fn settings_job(key: &str, value: JsonValue) -> ActionJob {
    ActionJob::new(ActionType::SettingsUpdate, json!({"settings": [{"key": key, "value": value}]})).with_requester(7)
}

#[tokio::test]
async fn test_only_one_concurrent_claim_wins() {
    let db = TestDatabase::new().await;
    let store = MySqlJobStore::new(db.pool());
    let id = db.enqueue(&settings_job("site.name", json!("Acme"))).await;

    let now = clock::now();
    let (a, b) = tokio::join!(store.claim(id, now), store.claim(id, now));
    let wins = [a.expect("claim a"), b.expect("claim b")].iter().filter(|won| **won).count();
    assert_eq!(wins, 1);

    let (status, _, _) = db.job_state(id).await;
    assert_eq!(status, "processing");
}

#[tokio::test]
async fn test_sweep_and_selection_filters() {
    let db = TestDatabase::new().await;
    let store = MySqlJobStore::new(db.pool());
    let now = clock::now();

    let stuck = db
        .enqueue(
            &settings_job("a", json!(1))
                .with_status(JobStatus::Processing)
                .started_at(now - Duration::hours(2)),
        )
        .await;
    let fresh_claim = db
        .enqueue(
            &settings_job("b", json!(2))
                .with_status(JobStatus::Processing)
                .started_at(now - Duration::minutes(1)),
        )
        .await;
    let stale = db.enqueue(&settings_job("c", json!(3)).created_at(now - Duration::hours(48))).await;
    let stale_failed = db
        .enqueue(
            &settings_job("d", json!(4))
                .with_status(JobStatus::Failed)
                .created_at(now - Duration::hours(48)),
        )
        .await;
    let exhausted = db.enqueue(&settings_job("e", json!(5)).with_retry_count(3)).await;
    let unknown = db.enqueue_raw_type("cache_flush", now).await;

    let recovered = store.recover_stuck(now - Duration::minutes(30)).await.expect("recover");
    let expired = store.expire_stale(now - Duration::hours(24)).await.expect("expire");
    assert_eq!(recovered, 1);
    assert_eq!(expired, 2);

    assert_eq!(db.job_state(stuck).await.0, "pending");
    assert_eq!(db.job_state(fresh_claim).await.0, "processing");
    assert_eq!(db.job_state(stale).await.0, "expired");
    assert_eq!(db.job_state(stale_failed).await.0, "expired");

    let batch = store.select_batch(10, 3).await.expect("select");
    let ids: Vec<_> = batch.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![stuck]);
    assert!(!ids.contains(&exhausted));
    assert!(!ids.contains(&unknown));
}

#[tokio::test]
async fn test_selection_orders_by_priority_then_age() {
    let db = TestDatabase::new().await;
    let store = MySqlJobStore::new(db.pool());
    let now = clock::now();

    let old_low = db.enqueue(&settings_job("a", json!(1)).created_at(now - Duration::minutes(10))).await;
    let new_high = db.enqueue(&settings_job("b", json!(2)).with_priority(5)).await;
    let new_low = db.enqueue(&settings_job("c", json!(3))).await;

    let batch = store.select_batch(2, 3).await.expect("select");
    let ids: Vec<_> = batch.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![new_high, old_low]);
    assert!(!ids.contains(&new_low));
}

#[tokio::test]
async fn test_stale_claim_cannot_record_failure_or_complete() {
    let db = TestDatabase::new().await;
    let store = MySqlJobStore::new(db.pool());
    let id = db.enqueue(&settings_job("site.name", json!("Acme"))).await;

    let first_claim_at = clock::now() - Duration::hours(1);
    assert!(store.claim(id, first_claim_at).await.expect("claim"));
    assert!(store.select_batch(1, 3).await.expect("select").is_empty());

    // The sweeper hands the job to a second invocation.
    store.recover_stuck(clock::now() - Duration::minutes(30)).await.expect("recover");
    let second_claim_at = clock::now();
    assert!(store.claim(id, second_claim_at).await.expect("reclaim"));

    let mut stale = settings_job("site.name", json!("Acme"))
        .with_status(JobStatus::Processing)
        .started_at(first_claim_at);
    stale.id = id;

    let disposition = FailureDisposition::Retry {
        retry_count: 1,
        max_retries: 3,
    };
    let recorded = store
        .record_failure(&stale, &disposition, "boom", clock::now())
        .await
        .expect("record failure");
    assert!(!recorded);

    let mut unit = store.begin().await.expect("begin");
    let completed = unit.complete(&stale, &json!({}), clock::now()).await.expect("complete");
    assert!(!completed);
    unit.rollback().await.expect("rollback");

    let (status, retry_count, error) = db.job_state(id).await;
    assert_eq!(status, "processing");
    assert_eq!(retry_count, 0);
    assert!(error.is_none());
}

#[tokio::test]
async fn test_health_record_is_overwritten() {
    let db = TestDatabase::new().await;
    let pool = db.pool();
    let store = Arc::new(MySqlJobStore::new(Arc::clone(&pool)));
    let settings = ProcessorSettings::default();
    let processor = ActionProcessor::new(Arc::clone(&store), mysql_registry(), settings.clone());

    processor.run().await.expect("first run");
    processor.run().await.expect("second run");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM system_health_checks")
        .fetch_one(pool.inner())
        .await
        .expect("count");
    assert_eq!(rows, 1);

    let record = store
        .latest_health(&settings.health_check_type, &settings.health_check_name)
        .await
        .expect("read health")
        .expect("record exists");
    assert_eq!(record.details["processed"], json!(0));
}

#[tokio::test]
async fn test_end_to_end_batch_with_builtin_handlers() {
    let db = TestDatabase::new().await;
    let pool = db.pool();
    let store = Arc::new(MySqlJobStore::new(Arc::clone(&pool)));

    let settings_id = db.enqueue(&settings_job("site.name", json!("Acme Staffing"))).await;
    let toggle_id = db
        .enqueue(&ActionJob::new(ActionType::ModuleToggle, json!({"module": "timesheets", "enabled": true})).with_requester(7))
        .await;
    let empty_period_id = db
        .enqueue(
            &ActionJob::new(ActionType::PayrollRecalculation, json!({"period": "2031-01"}))
                .with_requester(7)
                .with_max_retries(1),
        )
        .await;
    let bad_payload_id = db
        .enqueue(&ActionJob::new(ActionType::PageUpdate, json!({"slug": "About Us", "title": "T", "body": "B"})).with_requester(7))
        .await;

    let processor = ActionProcessor::new(Arc::clone(&store), mysql_registry(), ProcessorSettings::default())
        .with_audit_sink(Arc::new(MySqlAuditSink::new(Arc::clone(&pool))));
    let report = processor.run().await.expect("run");

    assert_eq!(report.summary.processed, 4);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 2);

    assert_eq!(db.job_state(settings_id).await.0, "completed");
    assert_eq!(db.job_state(toggle_id).await.0, "completed");

    let (status, retry_count, error) = db.job_state(empty_period_id).await;
    assert_eq!(status, "failed");
    assert_eq!(retry_count, 1);
    assert!(error.unwrap_or_default().contains("2031-01"));

    let (status, retry_count, _) = db.job_state(bad_payload_id).await;
    assert_eq!(status, "pending");
    assert_eq!(retry_count, 1);

    let setting = settings::find(pool.inner(), "site.name")
        .await
        .expect("find setting")
        .expect("setting written");
    assert_eq!(setting.setting_value, json!("Acme Staffing"));
    assert_eq!(setting.updated_by, 7);

    let module = feature_modules::find(pool.inner(), "timesheets")
        .await
        .expect("find module")
        .expect("module written");
    assert!(module.enabled);

    for id in [settings_id, toggle_id, empty_period_id, bad_payload_id] {
        assert_eq!(db.audit_count(id).await, 1);
    }

    let line = report.jobs.iter().find(|line| line.job_id == empty_period_id).expect("line");
    assert!(matches!(line.outcome, JobOutcome::Failed { retry_count: 1 }));
}

#[tokio::test]
async fn test_payroll_update_and_recalculation() {
    let db = TestDatabase::new().await;
    let pool = db.pool();
    let store = Arc::new(MySqlJobStore::new(Arc::clone(&pool)));

    db.enqueue(
        &ActionJob::new(
            ActionType::PayrollUpdate,
            json!({
                "period": "2024-03",
                "entries": [
                    {"employee_id": 11, "hours_worked": 160.0, "hourly_rate": 20.0},
                    {"employee_id": 12, "hours_worked": 80.0, "hourly_rate": 25.0, "adjustments": 50.0}
                ]
            }),
        )
        .with_priority(10),
    )
    .await;
    db.enqueue(&ActionJob::new(ActionType::PayrollRecalculation, json!({"period": "2024-03"}))).await;

    let processor = ActionProcessor::new(store, mysql_registry(), ProcessorSettings::default());
    let report = processor.run().await.expect("run");
    assert_eq!(report.summary.succeeded, 2, "{}", report);

    let line = payroll::find(pool.inner(), "2024-03", 12)
        .await
        .expect("find payroll")
        .expect("line written");
    assert!((line.gross_amount - 2050.0).abs() < 0.01);
}

/// Writes a setting, then fails, so the write must be rolled back.
struct WriteThenFail;

#[async_trait]
impl ActionHandler<MySqlUnit> for WriteThenFail {
    fn action_type(&self) -> ActionType {
        ActionType::SettingsUpdate
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        _payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        settings::upsert(unit.conn(), "half.written", &json!(true), ctx.requester_id.0, Utc::now()).await?;
        Err(HandlerError::failed("downstream rejected the change"))
    }
}

#[tokio::test]
async fn test_failed_handler_rolls_back_its_writes() {
    let db = TestDatabase::new().await;
    let pool = db.pool();
    let store = Arc::new(MySqlJobStore::new(Arc::clone(&pool)));
    let id = db.enqueue(&settings_job("ignored", json!(0))).await;

    let registry = HandlerRegistry::new().with(WriteThenFail);
    let processor = ActionProcessor::new(store, registry, ProcessorSettings::default());
    let report = processor.run().await.expect("run");
    assert_eq!(report.summary.failed, 1);

    let written = settings::find(pool.inner(), "half.written").await.expect("find");
    assert!(written.is_none());

    let (status, retry_count, error) = db.job_state(id).await;
    assert_eq!(status, "pending");
    assert_eq!(retry_count, 1);
    assert_eq!(error.as_deref(), Some("downstream rejected the change"));
}

#[tokio::test]
async fn test_unreachable_database_is_a_setup_error() {
    let db = TestDatabase::new().await;
    let pool = db.pool();
    let store = Arc::new(MySqlJobStore::new(Arc::clone(&pool)));
    pool.close().await;

    let processor = ActionProcessor::new(store, mysql_registry(), ProcessorSettings::default());
    let err = processor.run().await.expect_err("closed pool");
    assert!(err.is_setup());
}

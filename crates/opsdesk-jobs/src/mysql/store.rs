//! MySQL job store over `admin_action_queue` and `system_health_checks`.

use crate::error::{JobError, JobResult};
use crate::health::{HealthRecord, HealthStatus};
use crate::job::{ActionJob, ActionType, JobId, JobStatus};
use crate::retry::FailureDisposition;
use crate::store::{JobStore, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsdesk_core::{CorrelationId, RequesterId};
use opsdesk_repository::DatabasePoolInterface;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, MySql, MySqlConnection, Transaction};
use std::sync::Arc;
use tracing::debug;

/// Longest message stored in `system_health_checks.message`.
const HEALTH_MESSAGE_MAX_CHARS: usize = 512;

/// [`JobStore`] backed by MySQL.
#[derive(Clone)]
pub struct MySqlJobStore {
    pool: Arc<dyn DatabasePoolInterface>,
}

impl MySqlJobStore {
    /// Creates a store over the given pool.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

/// Database row representation of a job.
#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    correlation_id: String,
    action_type: String,
    payload: JsonValue,
    priority: i32,
    status: String,
    retry_count: u32,
    max_retries: u32,
    requester_id: i64,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<JsonValue>,
    error_message: Option<String>,
}

impl TryFrom<JobRow> for ActionJob {
    type Error = JobError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let action_type = row.action_type.parse::<ActionType>().map_err(|_| JobError::InvalidStoredValue {
            field: "action_type",
            value: row.action_type.clone(),
        })?;
        let status = row.status.parse::<JobStatus>().map_err(|_| JobError::InvalidStoredValue {
            field: "status",
            value: row.status.clone(),
        })?;

        Ok(ActionJob {
            id: JobId(row.id),
            correlation_id: CorrelationId::from_string(row.correlation_id),
            action_type,
            payload: row.payload,
            priority: row.priority,
            status,
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            requester_id: RequesterId(row.requester_id),
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            result: row.result,
            error_message: row.error_message,
        })
    }
}

/// Database row representation of a health record.
#[derive(Debug, FromRow)]
struct HealthRow {
    check_type: String,
    check_name: String,
    status: String,
    message: String,
    details: Option<JsonValue>,
    checked_at: DateTime<Utc>,
}

impl TryFrom<HealthRow> for HealthRecord {
    type Error = JobError;

    fn try_from(row: HealthRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<HealthStatus>().map_err(|_| JobError::InvalidStoredValue {
            field: "health status",
            value: row.status.clone(),
        })?;

        Ok(HealthRecord {
            check_type: row.check_type,
            check_name: row.check_name,
            status,
            message: row.message,
            details: row.details.unwrap_or(JsonValue::Null),
            checked_at: row.checked_at,
        })
    }
}

/// `'settings_update', 'page_update', ...` for the selection filter.
fn known_action_types() -> String {
    ActionType::ALL
        .iter()
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl JobStore for MySqlJobStore {
    type Unit = MySqlUnit;

    async fn ping(&self) -> JobResult<()> {
        self.pool.health_check().await.map_err(JobError::setup)
    }

    async fn recover_stuck(&self, cutoff: DateTime<Utc>) -> JobResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE admin_action_queue
            SET status = 'pending', started_at = NULL
            WHERE status = 'processing' AND started_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected())
    }

    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> JobResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE admin_action_queue
            SET status = 'expired'
            WHERE status IN ('pending', 'failed') AND created_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected())
    }

    async fn select_batch(&self, limit: u32, retry_cap: u32) -> JobResult<Vec<ActionJob>> {
        let sql = format!(
            r#"
            SELECT id, correlation_id, action_type, payload, priority, status,
                   retry_count, max_retries, requester_id,
                   created_at, started_at, completed_at, result, error_message
            FROM admin_action_queue
            WHERE status = 'pending'
              AND retry_count < LEAST(max_retries, ?)
              AND action_type IN ({})
            ORDER BY priority DESC, created_at ASC, id ASC
            LIMIT ?
            "#,
            known_action_types()
        );

        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(retry_cap)
            .bind(limit)
            .fetch_all(self.pool.inner())
            .await?;

        debug!(rows = rows.len(), "Fetched pending admin actions");
        rows.into_iter().map(ActionJob::try_from).collect()
    }

    async fn claim(&self, id: JobId, now: DateTime<Utc>) -> JobResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE admin_action_queue
            SET status = 'processing', started_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(id.value())
        .execute(self.pool.inner())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn begin(&self) -> JobResult<MySqlUnit> {
        let tx = self.pool.inner().begin().await?;
        Ok(MySqlUnit { tx })
    }

    async fn record_failure(
        &self,
        claimed: &ActionJob,
        disposition: &FailureDisposition,
        error: &str,
        now: DateTime<Utc>,
    ) -> JobResult<bool> {
        debug_assert!(JobStatus::Processing.can_transition_to(disposition.status()));
        let query = match disposition {
            FailureDisposition::Retry { retry_count, .. } => sqlx::query(
                r#"
                UPDATE admin_action_queue
                SET status = 'pending', retry_count = ?, error_message = ?, started_at = NULL
                WHERE id = ? AND status = 'processing' AND started_at = ? AND retry_count = ?
                "#,
            )
            .bind(*retry_count)
            .bind(error),
            FailureDisposition::Fail { retry_count } => sqlx::query(
                r#"
                UPDATE admin_action_queue
                SET status = 'failed', retry_count = ?, error_message = ?, completed_at = ?
                WHERE id = ? AND status = 'processing' AND started_at = ? AND retry_count = ?
                "#,
            )
            .bind(*retry_count)
            .bind(error)
            .bind(now),
        };

        let result = query
            .bind(claimed.id.value())
            .bind(claimed.started_at)
            .bind(claimed.retry_count)
            .execute(self.pool.inner())
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn pending_count(&self) -> JobResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_action_queue WHERE status = 'pending'")
            .fetch_one(self.pool.inner())
            .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn upsert_health(&self, record: &HealthRecord) -> JobResult<()> {
        let message: String = record.message.chars().take(HEALTH_MESSAGE_MAX_CHARS).collect();

        sqlx::query(
            r#"
            INSERT INTO system_health_checks (check_type, check_name, status, message, details, checked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                message = VALUES(message),
                details = VALUES(details),
                checked_at = VALUES(checked_at)
            "#,
        )
        .bind(&record.check_type)
        .bind(&record.check_name)
        .bind(record.status.as_str())
        .bind(message)
        .bind(&record.details)
        .bind(record.checked_at)
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    async fn latest_health(&self, check_type: &str, check_name: &str) -> JobResult<Option<HealthRecord>> {
        let row = sqlx::query_as::<_, HealthRow>(
            r#"
            SELECT check_type, check_name, status, message, details, checked_at
            FROM system_health_checks
            WHERE check_type = ? AND check_name = ?
            "#,
        )
        .bind(check_type)
        .bind(check_name)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(HealthRecord::try_from).transpose()
    }
}

/// One MySQL transaction. Handlers write through [`MySqlUnit::conn`].
pub struct MySqlUnit {
    tx: Transaction<'static, MySql>,
}

impl MySqlUnit {
    /// Connection inside the transaction.
    pub fn conn(&mut self) -> &mut MySqlConnection {
        &mut self.tx
    }
}

#[async_trait]
impl UnitOfWork for MySqlUnit {
    async fn complete(&mut self, claimed: &ActionJob, result: &JsonValue, now: DateTime<Utc>) -> JobResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE admin_action_queue
            SET status = 'completed', completed_at = ?, result = ?
            WHERE id = ? AND status = 'processing' AND started_at = ? AND retry_count = ?
            "#,
        )
        .bind(now)
        .bind(result)
        .bind(claimed.id.value())
        .bind(claimed.started_at)
        .bind(claimed.retry_count)
        .execute(&mut *self.tx)
        .await?;

        Ok(done.rows_affected() == 1)
    }

    async fn commit(self) -> JobResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> JobResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

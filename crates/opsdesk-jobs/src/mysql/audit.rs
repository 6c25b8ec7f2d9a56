//! MySQL audit sink writing `audit_logs`.

use crate::audit::{AuditEntry, AuditError, AuditSink};
use async_trait::async_trait;
use opsdesk_repository::DatabasePoolInterface;
use shaku::Component;
use std::sync::Arc;

const SUMMARY_MAX_CHARS: usize = 1024;
const TARGET_MAX_CHARS: usize = 255;

/// Appends audit entries to `audit_logs`, outside any job transaction.
#[derive(Component, Clone)]
#[shaku(interface = AuditSink)]
pub struct MySqlAuditSink {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl MySqlAuditSink {
    /// Creates a new MySQL audit sink.
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for MySqlAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let target: String = entry.target.chars().take(TARGET_MAX_CHARS).collect();
        let summary: String = entry.summary.chars().take(SUMMARY_MAX_CHARS).collect();

        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (requester_id, action, target, outcome, summary, job_id, correlation_id, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.requester_id.into_inner())
        .bind(entry.action.as_str())
        .bind(target)
        .bind(entry.outcome.as_str())
        .bind(summary)
        .bind(entry.job_id.value())
        .bind(entry.correlation_id.as_str())
        .bind(entry.recorded_at)
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }
}

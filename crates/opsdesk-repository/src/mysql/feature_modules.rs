//! `feature_modules` on/off switches.

use chrono::{DateTime, Utc};
use opsdesk_core::OpsResult;
use sqlx::{FromRow, MySqlExecutor};

/// A feature module switch.
#[derive(Debug, Clone, FromRow)]
pub struct FeatureModuleRow {
    pub module_key: String,
    pub enabled: bool,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
}

/// Sets a module's enabled flag, creating the row if needed.
pub async fn set_enabled<'e>(
    executor: impl MySqlExecutor<'e>,
    module_key: &str,
    enabled: bool,
    updated_by: i64,
    now: DateTime<Utc>,
) -> OpsResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO feature_modules (module_key, enabled, updated_by, updated_at)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            enabled = VALUES(enabled),
            updated_by = VALUES(updated_by),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(module_key)
    .bind(enabled)
    .bind(updated_by)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Looks up a module switch.
pub async fn find<'e>(executor: impl MySqlExecutor<'e>, module_key: &str) -> OpsResult<Option<FeatureModuleRow>> {
    let row = sqlx::query_as::<_, FeatureModuleRow>(
        r#"
        SELECT module_key, enabled, updated_by, updated_at
        FROM feature_modules
        WHERE module_key = ?
        "#,
    )
    .bind(module_key)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

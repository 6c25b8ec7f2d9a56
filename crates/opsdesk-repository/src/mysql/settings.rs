//! `site_settings` key/value store.

use chrono::{DateTime, Utc};
use opsdesk_core::OpsResult;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, MySqlExecutor};

/// A stored site setting.
#[derive(Debug, Clone, FromRow)]
pub struct SiteSettingRow {
    pub setting_key: String,
    pub setting_value: JsonValue,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
}

/// Inserts or overwrites a setting.
pub async fn upsert<'e>(
    executor: impl MySqlExecutor<'e>,
    key: &str,
    value: &JsonValue,
    updated_by: i64,
    now: DateTime<Utc>,
) -> OpsResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO site_settings (setting_key, setting_value, updated_by, updated_at)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            setting_value = VALUES(setting_value),
            updated_by = VALUES(updated_by),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(updated_by)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Looks up a setting by key.
pub async fn find<'e>(executor: impl MySqlExecutor<'e>, key: &str) -> OpsResult<Option<SiteSettingRow>> {
    let row = sqlx::query_as::<_, SiteSettingRow>(
        r#"
        SELECT setting_key, setting_value, updated_by, updated_at
        FROM site_settings
        WHERE setting_key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

//! `seo_metadata` per-path overrides.

use chrono::{DateTime, Utc};
use opsdesk_core::OpsResult;
use sqlx::{FromRow, MySqlExecutor};

/// SEO metadata for one path.
#[derive(Debug, Clone, FromRow)]
pub struct SeoRow {
    pub path: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub noindex: bool,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by an SEO update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct SeoWrite<'a> {
    pub path: &'a str,
    pub meta_title: Option<&'a str>,
    pub meta_description: Option<&'a str>,
    pub canonical_url: Option<&'a str>,
    pub noindex: Option<bool>,
}

/// Creates or patches the metadata for a path.
pub async fn upsert<'e>(
    executor: impl MySqlExecutor<'e>,
    seo: &SeoWrite<'_>,
    updated_by: i64,
    now: DateTime<Utc>,
) -> OpsResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO seo_metadata
            (path, meta_title, meta_description, canonical_url, noindex, updated_by, updated_at)
        VALUES (?, ?, ?, ?, COALESCE(?, FALSE), ?, ?)
        ON DUPLICATE KEY UPDATE
            meta_title = COALESCE(VALUES(meta_title), meta_title),
            meta_description = COALESCE(VALUES(meta_description), meta_description),
            canonical_url = COALESCE(VALUES(canonical_url), canonical_url),
            noindex = COALESCE(?, noindex),
            updated_by = VALUES(updated_by),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(seo.path)
    .bind(seo.meta_title)
    .bind(seo.meta_description)
    .bind(seo.canonical_url)
    .bind(seo.noindex)
    .bind(updated_by)
    .bind(now)
    .bind(seo.noindex)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Looks up the metadata for a path.
pub async fn find<'e>(executor: impl MySqlExecutor<'e>, path: &str) -> OpsResult<Option<SeoRow>> {
    let row = sqlx::query_as::<_, SeoRow>(
        r#"
        SELECT path, meta_title, meta_description, canonical_url, noindex, updated_by, updated_at
        FROM seo_metadata
        WHERE path = ?
        "#,
    )
    .bind(path)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

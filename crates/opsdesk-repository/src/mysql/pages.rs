//! `cms_pages` content.

use chrono::{DateTime, Utc};
use opsdesk_core::OpsResult;
use sqlx::{FromRow, MySqlExecutor};

/// A CMS page.
#[derive(Debug, Clone, FromRow)]
pub struct PageRow {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub published: bool,
    pub revision: u32,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a page update.
#[derive(Debug, Clone)]
pub struct PageWrite<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub published: bool,
}

/// Creates the page or replaces its content, bumping `revision`.
pub async fn upsert<'e>(
    executor: impl MySqlExecutor<'e>,
    page: &PageWrite<'_>,
    updated_by: i64,
    now: DateTime<Utc>,
) -> OpsResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO cms_pages (slug, title, body, published, revision, updated_by, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        ON DUPLICATE KEY UPDATE
            title = VALUES(title),
            body = VALUES(body),
            published = VALUES(published),
            revision = revision + 1,
            updated_by = VALUES(updated_by),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(page.slug)
    .bind(page.title)
    .bind(page.body)
    .bind(page.published)
    .bind(updated_by)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Looks up a page by slug.
pub async fn find<'e>(executor: impl MySqlExecutor<'e>, slug: &str) -> OpsResult<Option<PageRow>> {
    let row = sqlx::query_as::<_, PageRow>(
        r#"
        SELECT slug, title, body, published, revision, updated_by, updated_at
        FROM cms_pages
        WHERE slug = ?
        "#,
    )
    .bind(slug)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

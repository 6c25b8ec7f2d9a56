//! `payroll_entries` per employee and period.
//!
//! Amounts are stored as DECIMAL and read back through `CAST(.. AS DOUBLE)`
//! so callers never need a decimal type.

use chrono::{DateTime, Utc};
use opsdesk_core::OpsResult;
use sqlx::{FromRow, MySqlExecutor};

/// A payroll line as read back for reporting.
#[derive(Debug, Clone, FromRow)]
pub struct PayrollEntryRow {
    pub period: String,
    pub employee_id: i64,
    pub hours_worked: f64,
    pub hourly_rate: f64,
    pub adjustments: f64,
    pub gross_amount: f64,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
}

/// Inputs for one payroll line.
#[derive(Debug, Clone)]
pub struct PayrollWrite<'a> {
    pub period: &'a str,
    pub employee_id: i64,
    pub hours_worked: f64,
    pub hourly_rate: f64,
    pub adjustments: f64,
}

/// Writes a payroll line and computes its gross amount.
pub async fn upsert<'e>(
    executor: impl MySqlExecutor<'e>,
    entry: &PayrollWrite<'_>,
    updated_by: i64,
    now: DateTime<Utc>,
) -> OpsResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO payroll_entries
            (period, employee_id, hours_worked, hourly_rate, adjustments, gross_amount, updated_by, updated_at)
        VALUES (?, ?, ?, ?, ?, ROUND(? * ? + ?, 2), ?, ?)
        ON DUPLICATE KEY UPDATE
            hours_worked = VALUES(hours_worked),
            hourly_rate = VALUES(hourly_rate),
            adjustments = VALUES(adjustments),
            gross_amount = VALUES(gross_amount),
            updated_by = VALUES(updated_by),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(entry.period)
    .bind(entry.employee_id)
    .bind(entry.hours_worked)
    .bind(entry.hourly_rate)
    .bind(entry.adjustments)
    .bind(entry.hours_worked)
    .bind(entry.hourly_rate)
    .bind(entry.adjustments)
    .bind(updated_by)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Recomputes `gross_amount` for every line in a period.
///
/// Returns the number of lines whose amount changed.
pub async fn recalculate_period<'e>(
    executor: impl MySqlExecutor<'e>,
    period: &str,
    updated_by: i64,
    now: DateTime<Utc>,
) -> OpsResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payroll_entries
        SET gross_amount = ROUND(hours_worked * hourly_rate + adjustments, 2),
            updated_by = ?,
            updated_at = ?
        WHERE period = ?
          AND gross_amount <> ROUND(hours_worked * hourly_rate + adjustments, 2)
        "#,
    )
    .bind(updated_by)
    .bind(now)
    .bind(period)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Counts the lines in a period.
pub async fn count_period<'e>(executor: impl MySqlExecutor<'e>, period: &str) -> OpsResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payroll_entries WHERE period = ?")
        .bind(period)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

/// Looks up one payroll line.
pub async fn find<'e>(
    executor: impl MySqlExecutor<'e>,
    period: &str,
    employee_id: i64,
) -> OpsResult<Option<PayrollEntryRow>> {
    let row = sqlx::query_as::<_, PayrollEntryRow>(
        r#"
        SELECT period, employee_id,
               CAST(hours_worked AS DOUBLE) AS hours_worked,
               CAST(hourly_rate AS DOUBLE) AS hourly_rate,
               CAST(adjustments AS DOUBLE) AS adjustments,
               CAST(gross_amount AS DOUBLE) AS gross_amount,
               updated_by, updated_at
        FROM payroll_entries
        WHERE period = ? AND employee_id = ?
        "#,
    )
    .bind(period)
    .bind(employee_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

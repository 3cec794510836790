//! Database operations for `ingestion_runs`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `ingestion_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IngestionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub scope: String,
    pub trigger_source: String,
    /// One of `succeeded`, `source_failed`, `store_failed`.
    pub status: String,
    pub captured_at: DateTime<Utc>,
    pub observations: i32,
    pub snapshots_written: i32,
    pub duplicates: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values for a finished ingestion cycle.
#[derive(Debug, Clone)]
pub struct NewIngestionRun<'a> {
    pub scope: &'a str,
    pub trigger_source: &'a str,
    pub status: &'a str,
    pub captured_at: DateTime<Utc>,
    pub observations: i32,
    pub snapshots_written: i32,
    pub duplicates: i32,
    pub error_message: Option<&'a str>,
}

/// Records one finished ingestion cycle and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_ingestion_run(
    pool: &PgPool,
    run: &NewIngestionRun<'_>,
) -> Result<IngestionRunRow, DbError> {
    let row = sqlx::query_as::<_, IngestionRunRow>(
        "INSERT INTO ingestion_runs \
             (public_id, scope, trigger_source, status, captured_at, \
              observations, snapshots_written, duplicates, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id, public_id, scope, trigger_source, status, captured_at, \
                   observations, snapshots_written, duplicates, error_message, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(run.scope)
    .bind(run.trigger_source)
    .bind(run.status)
    .bind(run.captured_at)
    .bind(run.observations)
    .bind(run.snapshots_written)
    .bind(run.duplicates)
    .bind(run.error_message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent `limit` runs, optionally for one scope, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_ingestion_runs(
    pool: &PgPool,
    scope: Option<&str>,
    limit: i64,
) -> Result<Vec<IngestionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, IngestionRunRow>(
        "SELECT id, public_id, scope, trigger_source, status, captured_at, \
                observations, snapshots_written, duplicates, error_message, created_at \
         FROM ingestion_runs \
         WHERE ($1::TEXT IS NULL OR scope = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(scope)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

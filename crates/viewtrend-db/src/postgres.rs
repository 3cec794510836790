//! Postgres-backed [`SnapshotStore`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{error::ErrorKind, PgPool};

use crate::store::{AppendOutcome, ItemMetadata, ItemRecord, SnapshotPoint, SnapshotStore};
use crate::DbError;

/// Durable snapshot store over the `items` and `snapshots` tables.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotPointRow {
    item_id: String,
    captured_at: DateTime<Utc>,
    metric: i64,
}

impl SnapshotPointRow {
    fn into_point(self) -> Result<(String, SnapshotPoint), DbError> {
        let metric = u64::try_from(self.metric).map_err(|_| DbError::InvalidStoredMetric {
            item_id: self.item_id.clone(),
            value: self.metric,
        })?;
        Ok((
            self.item_id,
            SnapshotPoint {
                captured_at: self.captured_at,
                metric,
            },
        ))
    }
}

fn collect_points(rows: Vec<SnapshotPointRow>) -> Result<HashMap<String, SnapshotPoint>, DbError> {
    rows.into_iter().map(SnapshotPointRow::into_point).collect()
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| matches!(db.kind(), ErrorKind::ForeignKeyViolation))
}

impl SnapshotStore for PgSnapshotStore {
    /// Conflicts on `(item_id, scope, captured_at)` resolve to a no-op inside
    /// Postgres, so racing writers never produce duplicate rows.
    async fn append(
        &self,
        item_id: &str,
        scope: &str,
        captured_at: DateTime<Utc>,
        metric: u64,
    ) -> Result<AppendOutcome, DbError> {
        let metric_db = i64::try_from(metric).map_err(|_| DbError::MetricOutOfRange(metric))?;

        let result = sqlx::query(
            "INSERT INTO snapshots (item_id, scope, captured_at, metric) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (item_id, scope, captured_at) DO NOTHING",
        )
        .bind(item_id)
        .bind(scope)
        .bind(captured_at)
        .bind(metric_db)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                tracing::warn!(item_id, scope, "snapshot rejected: item has no metadata row");
                DbError::UnknownItem(item_id.to_string())
            } else {
                DbError::from(e)
            }
        })?;

        if result.rows_affected() == 0 {
            Ok(AppendOutcome::Duplicate)
        } else {
            Ok(AppendOutcome::Inserted)
        }
    }

    async fn upsert_metadata(
        &self,
        item_id: &str,
        scope: &str,
        metadata: &ItemMetadata,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO items (id, title, channel, thumbnail, scope, first_seen, last_seen) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                 title     = EXCLUDED.title, \
                 channel   = EXCLUDED.channel, \
                 thumbnail = EXCLUDED.thumbnail, \
                 scope     = EXCLUDED.scope, \
                 last_seen = EXCLUDED.last_seen",
        )
        .bind(item_id)
        .bind(&metadata.title)
        .bind(&metadata.channel)
        .bind(&metadata.thumbnail)
        .bind(scope)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_for(&self, scope: &str) -> Result<HashMap<String, SnapshotPoint>, DbError> {
        let rows = sqlx::query_as::<_, SnapshotPointRow>(
            "SELECT DISTINCT ON (item_id) item_id, captured_at, metric \
             FROM snapshots \
             WHERE scope = $1 \
             ORDER BY item_id, captured_at DESC",
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        collect_points(rows)
    }

    async fn nearest_at_or_before(
        &self,
        scope: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<HashMap<String, SnapshotPoint>, DbError> {
        let rows = sqlx::query_as::<_, SnapshotPointRow>(
            "SELECT DISTINCT ON (item_id) item_id, captured_at, metric \
             FROM snapshots \
             WHERE scope = $1 \
               AND captured_at <= $2 \
             ORDER BY item_id, captured_at DESC",
        )
        .bind(scope)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        collect_points(rows)
    }

    async fn items(&self, ids: &[String]) -> Result<HashMap<String, ItemRecord>, DbError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ItemRecord>(
            "SELECT id, title, channel, thumbnail, scope, first_seen, last_seen \
             FROM items \
             WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.id.clone(), row)).collect())
    }

    async fn history(&self, scope: &str, item_id: &str) -> Result<Vec<SnapshotPoint>, DbError> {
        let rows = sqlx::query_as::<_, SnapshotPointRow>(
            "SELECT item_id, captured_at, metric \
             FROM snapshots \
             WHERE scope = $1 AND item_id = $2 \
             ORDER BY captured_at",
        )
        .bind(scope)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_point().map(|(_, point)| point))
            .collect()
    }
}

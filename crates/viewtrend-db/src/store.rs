//! The snapshot-store capability shared by the Postgres and in-memory backends.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use viewtrend_core::Observation;

use crate::DbError;

/// One stored observation of an item, stripped of its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPoint {
    pub captured_at: DateTime<Utc>,
    pub metric: u64,
}

/// Display fields refreshed on every observation of an item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemMetadata {
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
}

impl From<&Observation> for ItemMetadata {
    fn from(obs: &Observation) -> Self {
        Self {
            title: obs.title.clone(),
            channel: obs.channel.clone(),
            thumbnail: obs.thumbnail.clone(),
        }
    }
}

/// A row from the `items` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ItemRecord {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    /// Scope of the most recent observation.
    pub scope: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Result of [`SnapshotStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// A snapshot with the same `(item_id, scope, captured_at)` already existed.
    Duplicate,
}

/// Append-only snapshot persistence plus last-write-wins item metadata.
///
/// Implementations enforce the `(item_id, scope, captured_at)` uniqueness
/// invariant themselves; callers never lock around [`append`](Self::append).
pub trait SnapshotStore: Send + Sync {
    /// Insert a snapshot unless one already exists for the key.
    ///
    /// The item must already exist (see [`upsert_metadata`](Self::upsert_metadata)).
    fn append(
        &self,
        item_id: &str,
        scope: &str,
        captured_at: DateTime<Utc>,
        metric: u64,
    ) -> impl Future<Output = Result<AppendOutcome, DbError>> + Send;

    /// Create the item on first sight, otherwise overwrite its display fields,
    /// scope tag and `last_seen`.
    fn upsert_metadata(
        &self,
        item_id: &str,
        scope: &str,
        metadata: &ItemMetadata,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Per item in `scope`, the snapshot with the greatest `captured_at`.
    fn latest_for(
        &self,
        scope: &str,
    ) -> impl Future<Output = Result<HashMap<String, SnapshotPoint>, DbError>> + Send;

    /// Per item in `scope`, the latest snapshot taken at or before `cutoff`.
    ///
    /// Items with no such snapshot are absent from the map.
    fn nearest_at_or_before(
        &self,
        scope: &str,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<HashMap<String, SnapshotPoint>, DbError>> + Send;

    /// Current metadata for the given ids. Unknown ids are skipped.
    fn items(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<HashMap<String, ItemRecord>, DbError>> + Send;

    /// Every snapshot of one item in `scope`, oldest first.
    fn history(
        &self,
        scope: &str,
        item_id: &str,
    ) -> impl Future<Output = Result<Vec<SnapshotPoint>, DbError>> + Send;
}

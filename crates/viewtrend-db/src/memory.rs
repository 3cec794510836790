//! In-memory [`SnapshotStore`] used by tests and local tooling.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{AppendOutcome, ItemMetadata, ItemRecord, SnapshotPoint, SnapshotStore};
use crate::DbError;

type Series = BTreeMap<DateTime<Utc>, u64>;

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, ItemRecord>,
    /// scope -> item_id -> captured_at -> metric
    snapshots: HashMap<String, HashMap<String, Series>>,
}

/// Snapshot store backed by ordered maps behind a single `RwLock`.
///
/// Every write takes the write lock for its whole check-and-insert, which is
/// what makes concurrent appends of one key collapse to a single row.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    inner: RwLock<Inner>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored snapshots across all scopes.
    pub async fn snapshot_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner
            .snapshots
            .values()
            .flat_map(HashMap::values)
            .map(BTreeMap::len)
            .sum()
    }
}

fn collect_by_item<F>(inner: &Inner, scope: &str, pick: F) -> HashMap<String, SnapshotPoint>
where
    F: Fn(&Series) -> Option<(&DateTime<Utc>, &u64)>,
{
    inner
        .snapshots
        .get(scope)
        .map(|by_item| {
            by_item
                .iter()
                .filter_map(|(item_id, series)| {
                    pick(series).map(|(captured_at, metric)| {
                        (
                            item_id.clone(),
                            SnapshotPoint {
                                captured_at: *captured_at,
                                metric: *metric,
                            },
                        )
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SnapshotStore for MemorySnapshotStore {
    async fn append(
        &self,
        item_id: &str,
        scope: &str,
        captured_at: DateTime<Utc>,
        metric: u64,
    ) -> Result<AppendOutcome, DbError> {
        // Mirror the Postgres BIGINT column so both backends accept the same values.
        if i64::try_from(metric).is_err() {
            return Err(DbError::MetricOutOfRange(metric));
        }

        let mut inner = self.inner.write().await;
        if !inner.items.contains_key(item_id) {
            return Err(DbError::UnknownItem(item_id.to_string()));
        }

        let series = inner
            .snapshots
            .entry(scope.to_string())
            .or_default()
            .entry(item_id.to_string())
            .or_default();

        if series.contains_key(&captured_at) {
            return Ok(AppendOutcome::Duplicate);
        }
        series.insert(captured_at, metric);
        Ok(AppendOutcome::Inserted)
    }

    async fn upsert_metadata(
        &self,
        item_id: &str,
        scope: &str,
        metadata: &ItemMetadata,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut inner = self.inner.write().await;
        inner
            .items
            .entry(item_id.to_string())
            .and_modify(|item| {
                item.title.clone_from(&metadata.title);
                item.channel.clone_from(&metadata.channel);
                item.thumbnail.clone_from(&metadata.thumbnail);
                scope.clone_into(&mut item.scope);
                item.last_seen = now;
            })
            .or_insert_with(|| ItemRecord {
                id: item_id.to_string(),
                title: metadata.title.clone(),
                channel: metadata.channel.clone(),
                thumbnail: metadata.thumbnail.clone(),
                scope: scope.to_string(),
                first_seen: now,
                last_seen: now,
            });
        Ok(())
    }

    async fn latest_for(&self, scope: &str) -> Result<HashMap<String, SnapshotPoint>, DbError> {
        let inner = self.inner.read().await;
        Ok(collect_by_item(&inner, scope, |series| {
            series.last_key_value()
        }))
    }

    async fn nearest_at_or_before(
        &self,
        scope: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<HashMap<String, SnapshotPoint>, DbError> {
        let inner = self.inner.read().await;
        Ok(collect_by_item(&inner, scope, |series| {
            series.range(..=cutoff).next_back()
        }))
    }

    async fn items(&self, ids: &[String]) -> Result<HashMap<String, ItemRecord>, DbError> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.items.get(id).map(|item| (id.clone(), item.clone())))
            .collect())
    }

    async fn history(&self, scope: &str, item_id: &str) -> Result<Vec<SnapshotPoint>, DbError> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .get(scope)
            .and_then(|by_item| by_item.get(item_id))
            .map(|series| {
                series
                    .iter()
                    .map(|(captured_at, metric)| SnapshotPoint {
                        captured_at: *captured_at,
                        metric: *metric,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

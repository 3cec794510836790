//! Baseline-relative growth ranking.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use viewtrend_db::{ItemRecord, SnapshotPoint, SnapshotStore};

use crate::EngineError;

/// One ranked item in a growth listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthEntry {
    pub item_id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub latest_metric: u64,
    pub latest_at: DateTime<Utc>,
    pub baseline_metric: u64,
    pub baseline_at: DateTime<Utc>,
    /// `latest_metric - baseline_metric`, never below zero.
    pub delta: u64,
}

/// One item in a latest-metric listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestEntry {
    pub item_id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub metric: u64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Ranked<'a> {
    item_id: &'a str,
    latest: SnapshotPoint,
    baseline: SnapshotPoint,
    delta: u64,
}

/// Read-only ranking queries over a snapshot store.
#[derive(Debug)]
pub struct GrowthEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for GrowthEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SnapshotStore> GrowthEngine<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Rank the items of `scope` by metric growth over the trailing `window`.
    ///
    /// The window ends at the newest `captured_at` stored for the scope, not
    /// at the current time. Each item's baseline is its latest snapshot at or
    /// before `anchor - window`; items with no baseline are left out. Results
    /// are ordered by delta, then latest metric (both descending), then
    /// `item_id` ascending, and truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] for a non-positive `window` or
    /// `limit` without reading the store, and [`EngineError::Store`] if a
    /// store read fails.
    pub async fn rank(
        &self,
        scope: &str,
        window: Duration,
        limit: i64,
    ) -> Result<Vec<GrowthEntry>, EngineError> {
        if window <= Duration::zero() {
            return Err(EngineError::InvalidArgument(format!(
                "window must be positive, got {} minutes",
                window.num_minutes()
            )));
        }
        let limit = positive_limit(limit)?;

        let latest = self.store.latest_for(scope).await?;
        let Some(anchor) = latest.values().map(|p| p.captured_at).max() else {
            return Ok(Vec::new());
        };
        let cutoff = anchor.checked_sub_signed(window).ok_or_else(|| {
            EngineError::InvalidArgument(format!(
                "window of {} minutes reaches before the earliest representable time",
                window.num_minutes()
            ))
        })?;
        let baseline = self.store.nearest_at_or_before(scope, cutoff).await?;

        let mut ranked = compute_deltas(scope, &latest, &baseline);
        ranked.sort_by(compare_ranked);
        ranked.truncate(limit);

        tracing::debug!(
            scope,
            %anchor,
            %cutoff,
            candidates = latest.len(),
            ranked = ranked.len(),
            "growth ranking computed"
        );

        let ids: Vec<String> = ranked.iter().map(|r| r.item_id.to_string()).collect();
        let items = self.store.items(&ids).await?;

        Ok(ranked
            .into_iter()
            .map(|r| {
                let (title, channel, thumbnail) = display_fields(items.get(r.item_id));
                GrowthEntry {
                    item_id: r.item_id.to_string(),
                    title,
                    channel,
                    thumbnail,
                    latest_metric: r.latest.metric,
                    latest_at: r.latest.captured_at,
                    baseline_metric: r.baseline.metric,
                    baseline_at: r.baseline.captured_at,
                    delta: r.delta,
                }
            })
            .collect())
    }

    /// Every item's most recent snapshot in `scope`, highest metric first
    /// (ties by `item_id` ascending), truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] for a non-positive `limit` and
    /// [`EngineError::Store`] if a store read fails.
    pub async fn latest(&self, scope: &str, limit: i64) -> Result<Vec<LatestEntry>, EngineError> {
        let limit = positive_limit(limit)?;

        let latest = self.store.latest_for(scope).await?;
        let mut points: Vec<(&String, &SnapshotPoint)> = latest.iter().collect();
        points.sort_by(|a, b| b.1.metric.cmp(&a.1.metric).then_with(|| a.0.cmp(b.0)));
        points.truncate(limit);

        let ids: Vec<String> = points.iter().map(|(id, _)| (*id).clone()).collect();
        let items = self.store.items(&ids).await?;

        Ok(points
            .into_iter()
            .map(|(item_id, point)| {
                let (title, channel, thumbnail) = display_fields(items.get(item_id));
                LatestEntry {
                    item_id: item_id.clone(),
                    title,
                    channel,
                    thumbnail,
                    metric: point.metric,
                    captured_at: point.captured_at,
                }
            })
            .collect())
    }
}

fn positive_limit(limit: i64) -> Result<usize, EngineError> {
    if limit <= 0 {
        return Err(EngineError::InvalidArgument(format!(
            "limit must be positive, got {limit}"
        )));
    }
    Ok(usize::try_from(limit).unwrap_or(usize::MAX))
}

fn compute_deltas<'a>(
    scope: &str,
    latest: &'a HashMap<String, SnapshotPoint>,
    baseline: &HashMap<String, SnapshotPoint>,
) -> Vec<Ranked<'a>> {
    latest
        .iter()
        .filter_map(|(item_id, latest_point)| {
            let baseline_point = baseline.get(item_id)?;
            if latest_point.metric < baseline_point.metric {
                tracing::warn!(
                    scope,
                    item_id = %item_id,
                    latest = latest_point.metric,
                    baseline = baseline_point.metric,
                    "metric decreased inside window; clamping growth to zero"
                );
            }
            Some(Ranked {
                item_id,
                latest: *latest_point,
                baseline: *baseline_point,
                delta: latest_point.metric.saturating_sub(baseline_point.metric),
            })
        })
        .collect()
}

fn compare_ranked(a: &Ranked<'_>, b: &Ranked<'_>) -> Ordering {
    b.delta
        .cmp(&a.delta)
        .then_with(|| b.latest.metric.cmp(&a.latest.metric))
        .then_with(|| a.item_id.cmp(b.item_id))
}

fn display_fields(item: Option<&ItemRecord>) -> (String, String, Option<String>) {
    item.map_or_else(
        || (String::new(), String::new(), None),
        |item| {
            (
                item.title.clone(),
                item.channel.clone(),
                item.thumbnail.clone(),
            )
        },
    )
}

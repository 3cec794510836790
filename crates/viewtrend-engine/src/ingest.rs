//! Periodic ingestion: one batch per scope from a metric source into the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use futures::{stream, StreamExt};
use serde::Serialize;
use viewtrend_core::{MetricSource, Observation, ScopeConfig};
use viewtrend_db::{AppendOutcome, DbError, ItemMetadata, NewIngestionRun, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Succeeded,
    /// The source failed or timed out; nothing was written.
    SourceFailed,
    /// A store write failed; earlier writes of the batch are kept.
    StoreFailed,
}

impl CycleStatus {
    /// Value stored in `ingestion_runs.status`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::SourceFailed => "source_failed",
            Self::StoreFailed => "store_failed",
        }
    }
}

/// Outcome of one ingestion cycle for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub scope: String,
    /// Timestamp shared by every snapshot written in this cycle.
    pub captured_at: DateTime<Utc>,
    pub status: CycleStatus,
    pub observations: usize,
    pub snapshots_written: usize,
    pub duplicates: usize,
    pub error: Option<String>,
}

impl CycleReport {
    fn new(scope: &str, captured_at: DateTime<Utc>) -> Self {
        Self {
            scope: scope.to_string(),
            captured_at,
            status: CycleStatus::Succeeded,
            observations: 0,
            snapshots_written: 0,
            duplicates: 0,
            error: None,
        }
    }

    fn fail(mut self, status: CycleStatus, error: String) -> Self {
        self.status = status;
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == CycleStatus::Succeeded
    }

    /// Row for the `ingestion_runs` audit table. Counts saturate at `i32::MAX`.
    #[must_use]
    pub fn to_new_run<'a>(&'a self, trigger_source: &'a str) -> NewIngestionRun<'a> {
        NewIngestionRun {
            scope: &self.scope,
            trigger_source,
            status: self.status.as_str(),
            captured_at: self.captured_at,
            observations: saturating_i32(self.observations),
            snapshots_written: saturating_i32(self.snapshots_written),
            duplicates: saturating_i32(self.duplicates),
            error_message: self.error.as_deref(),
        }
    }
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Drives batches from a [`MetricSource`] into a [`SnapshotStore`].
///
/// Cycles for different scopes are independent: a failing or slow source for
/// one scope is bounded by `fetch_timeout` and recorded in that scope's
/// report only.
#[derive(Debug)]
pub struct IngestionScheduler<S, M> {
    store: Arc<S>,
    source: Arc<M>,
    fetch_timeout: Duration,
    max_concurrent_scopes: usize,
}

impl<S: SnapshotStore, M: MetricSource> IngestionScheduler<S, M> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        source: Arc<M>,
        fetch_timeout: Duration,
        max_concurrent_scopes: usize,
    ) -> Self {
        Self {
            store,
            source,
            fetch_timeout,
            max_concurrent_scopes: max_concurrent_scopes.max(1),
        }
    }

    /// Run one ingestion cycle for `scope`. Never fails; errors are reported
    /// through [`CycleReport::status`].
    pub async fn run_cycle(&self, scope: &ScopeConfig) -> CycleReport {
        // TIMESTAMPTZ keeps microseconds; truncating keeps the key stable on round-trip.
        let now = Utc::now().trunc_subsecs(6);
        let mut report = CycleReport::new(&scope.name, now);

        let observations =
            match tokio::time::timeout(self.fetch_timeout, self.source.fetch(scope)).await {
                Ok(Ok(observations)) => observations,
                Ok(Err(e)) => {
                    tracing::warn!(
                        scope = %scope.name,
                        transient = e.is_transient(),
                        error = %e,
                        "metric source failed; no observations this cycle"
                    );
                    return report.fail(CycleStatus::SourceFailed, e.to_string());
                }
                Err(_) => {
                    let message = format!(
                        "metric source timed out after {}s",
                        self.fetch_timeout.as_secs_f64()
                    );
                    tracing::warn!(scope = %scope.name, "{message}");
                    return report.fail(CycleStatus::SourceFailed, message);
                }
            };

        report.observations = observations.len();

        for obs in &observations {
            match self.write_observation(&scope.name, obs, now).await {
                Ok(AppendOutcome::Inserted) => report.snapshots_written += 1,
                Ok(AppendOutcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    tracing::error!(
                        scope = %scope.name,
                        item_id = %obs.id,
                        written = report.snapshots_written,
                        error = %e,
                        "snapshot store write failed; stopping cycle"
                    );
                    return report.fail(CycleStatus::StoreFailed, e.to_string());
                }
            }
        }

        tracing::info!(
            scope = %scope.name,
            captured_at = %now,
            observations = report.observations,
            written = report.snapshots_written,
            duplicates = report.duplicates,
            "ingestion cycle complete"
        );
        report
    }

    /// Run one cycle per scope, at most `max_concurrent_scopes` at a time.
    ///
    /// Reports come back in the same order as `scopes`.
    pub async fn run_all(&self, scopes: &[ScopeConfig]) -> Vec<CycleReport> {
        let cycles: Vec<_> = scopes
            .iter()
            .enumerate()
            .map(|(index, scope)| {
                let fut = self.run_cycle(scope);
                async move { (index, fut.await) }
            })
            .collect();
        let mut reports: Vec<(usize, CycleReport)> = stream::iter(cycles)
            .buffer_unordered(self.max_concurrent_scopes)
            .collect()
            .await;

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    async fn write_observation(
        &self,
        scope: &str,
        obs: &Observation,
        now: DateTime<Utc>,
    ) -> Result<AppendOutcome, DbError> {
        self.store
            .upsert_metadata(&obs.id, scope, &ItemMetadata::from(obs), now)
            .await?;
        self.store.append(&obs.id, scope, now, obs.metric).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use viewtrend_core::SourceError;
    use viewtrend_db::MemorySnapshotStore;

    use super::*;

    /// Canned per-scope responses; scopes listed in `hang` never answer.
    #[derive(Default)]
    struct FakeSource {
        responses: HashMap<String, Result<Vec<Observation>, SourceError>>,
        hang: Vec<String>,
    }

    impl FakeSource {
        fn with(mut self, scope: &str, response: Result<Vec<Observation>, SourceError>) -> Self {
            self.responses.insert(scope.to_string(), response);
            self
        }

        fn hanging(mut self, scope: &str) -> Self {
            self.hang.push(scope.to_string());
            self
        }
    }

    impl MetricSource for FakeSource {
        async fn fetch(&self, scope: &ScopeConfig) -> Result<Vec<Observation>, SourceError> {
            if self.hang.contains(&scope.name) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.responses
                .get(&scope.name)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn obs(id: &str, metric: u64) -> Observation {
        Observation {
            id: id.to_string(),
            title: format!("title {id}"),
            channel: "channel".to_string(),
            thumbnail: None,
            metric,
        }
    }

    fn scheduler(
        source: FakeSource,
    ) -> (
        Arc<MemorySnapshotStore>,
        IngestionScheduler<MemorySnapshotStore, FakeSource>,
    ) {
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = IngestionScheduler::new(
            Arc::clone(&store),
            Arc::new(source),
            Duration::from_secs(5),
            4,
        );
        (store, scheduler)
    }

    #[tokio::test]
    async fn cycle_writes_every_observation_with_one_timestamp() {
        let source = FakeSource::default().with(
            "KR",
            Ok(vec![obs("a", 10), obs("b", 20), obs("c", 30)]),
        );
        let (store, scheduler) = scheduler(source);

        let report = scheduler.run_cycle(&ScopeConfig::single_region("KR")).await;

        assert_eq!(report.status, CycleStatus::Succeeded);
        assert_eq!(report.observations, 3);
        assert_eq!(report.snapshots_written, 3);
        assert_eq!(report.duplicates, 0);

        let latest = store.latest_for("KR").await.unwrap();
        assert_eq!(latest.len(), 3);
        assert!(latest.values().all(|p| p.captured_at == report.captured_at));
        assert_eq!(report.captured_at.timestamp_subsec_nanos() % 1_000, 0);

        let items = store.items(&["b".to_string()]).await.unwrap();
        assert_eq!(items["b"].title, "title b");
        assert_eq!(items["b"].scope, "KR");
    }

    #[tokio::test]
    async fn repeated_item_in_one_batch_is_a_duplicate() {
        let source = FakeSource::default().with("KR", Ok(vec![obs("a", 10), obs("a", 10)]));
        let (store, scheduler) = scheduler(source);

        let report = scheduler.run_cycle(&ScopeConfig::single_region("KR")).await;

        assert!(report.is_success());
        assert_eq!(report.snapshots_written, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(store.snapshot_count().await, 1);
    }

    #[tokio::test]
    async fn source_error_yields_zero_observations() {
        let source = FakeSource::default().with(
            "KR",
            Err(SourceError::Configuration("YOUTUBE_API_KEY not set".to_string())),
        );
        let (store, scheduler) = scheduler(source);

        let report = scheduler.run_cycle(&ScopeConfig::single_region("KR")).await;

        assert_eq!(report.status, CycleStatus::SourceFailed);
        assert_eq!(report.observations, 0);
        assert!(report.error.unwrap().contains("YOUTUBE_API_KEY"));
        assert_eq!(store.snapshot_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_is_cut_off_by_timeout() {
        let source = FakeSource::default().hanging("KR");
        let (_store, scheduler) = scheduler(source);

        let report = scheduler.run_cycle(&ScopeConfig::single_region("KR")).await;

        assert_eq!(report.status, CycleStatus::SourceFailed);
        assert!(report.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn store_failure_stops_cycle_and_keeps_earlier_writes() {
        let source = FakeSource::default().with(
            "KR",
            Ok(vec![obs("a", 1), obs("b", u64::MAX), obs("c", 3)]),
        );
        let (store, scheduler) = scheduler(source);

        let report = scheduler.run_cycle(&ScopeConfig::single_region("KR")).await;

        assert_eq!(report.status, CycleStatus::StoreFailed);
        assert_eq!(report.observations, 3);
        assert_eq!(report.snapshots_written, 1);
        let latest = store.latest_for("KR").await.unwrap();
        assert!(latest.contains_key("a"));
        assert!(!latest.contains_key("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_scopes_do_not_affect_siblings() {
        let source = FakeSource::default()
            .with("KR", Ok(vec![obs("a", 10)]))
            .with("US", Err(SourceError::Transient("HTTP 503".to_string())))
            .hanging("JP")
            .with("BR", Ok(vec![obs("b", 20), obs("c", 30)]));
        let (store, scheduler) = scheduler(source);
        let scopes: Vec<ScopeConfig> = ["KR", "US", "JP", "BR"]
            .into_iter()
            .map(ScopeConfig::single_region)
            .collect();

        let reports = scheduler.run_all(&scopes).await;

        let summary: Vec<(&str, CycleStatus)> = reports
            .iter()
            .map(|r| (r.scope.as_str(), r.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("KR", CycleStatus::Succeeded),
                ("US", CycleStatus::SourceFailed),
                ("JP", CycleStatus::SourceFailed),
                ("BR", CycleStatus::Succeeded),
            ]
        );
        assert_eq!(store.latest_for("KR").await.unwrap().len(), 1);
        assert_eq!(store.latest_for("BR").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn report_converts_to_audit_row() {
        let source = FakeSource::default().with(
            "KR",
            Err(SourceError::Transient("HTTP 503".to_string())),
        );
        let (_store, scheduler) = scheduler(source);

        let report = scheduler.run_cycle(&ScopeConfig::single_region("KR")).await;
        let row = report.to_new_run("cli");

        assert_eq!(row.scope, "KR");
        assert_eq!(row.trigger_source, "cli");
        assert_eq!(row.status, "source_failed");
        assert_eq!(row.captured_at, report.captured_at);
        assert_eq!(row.observations, 0);
        assert!(row.error_message.is_some_and(|m| m.contains("503")));
    }

    #[test]
    fn counts_saturate_when_converted() {
        assert_eq!(saturating_i32(7), 7);
        assert_eq!(saturating_i32(usize::MAX), i32::MAX);
    }

    #[test]
    fn status_strings_match_stored_values() {
        assert_eq!(CycleStatus::Succeeded.as_str(), "succeeded");
        assert_eq!(CycleStatus::SourceFailed.as_str(), "source_failed");
        assert_eq!(CycleStatus::StoreFailed.as_str(), "store_failed");
        assert_eq!(
            serde_json::to_value(CycleStatus::SourceFailed).unwrap(),
            "source_failed"
        );
    }
}

//! `collect` command handlers.
//!
//! A real run goes through the same [`IngestionScheduler`] the server uses and
//! records one `ingestion_runs` row per scope. Per-scope failures are reported
//! and recorded, not propagated, so one bad scope does not abort the run.

use std::sync::Arc;
use std::time::Duration;

use viewtrend_core::{AppConfig, MetricSource, ScopeConfig};
use viewtrend_db::PgSnapshotStore;
use viewtrend_engine::{CycleReport, IngestionScheduler};
use viewtrend_youtube::YoutubeSource;

/// Resolve the scopes to collect. An unknown `--scope` is an error.
pub(crate) fn select_scopes(
    scopes: &viewtrend_core::ScopesFile,
    filter: Option<&str>,
) -> anyhow::Result<Vec<ScopeConfig>> {
    match filter {
        Some(name) => {
            let scope = scopes.find(name).ok_or_else(|| {
                anyhow::anyhow!("scope '{name}' is not configured; check the scopes file")
            })?;
            Ok(vec![scope.clone()])
        }
        None => Ok(scopes.scopes.clone()),
    }
}

fn build_source(config: &AppConfig) -> anyhow::Result<YoutubeSource> {
    YoutubeSource::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("cannot collect without a YouTube source: {e}"))
}

/// Fetch each scope and print what would be stored, without touching the database.
///
/// # Errors
///
/// Returns an error if the scopes file cannot be loaded, the scope filter is
/// unknown, or `YOUTUBE_API_KEY` is missing. Per-scope fetch failures are
/// printed and skipped.
pub(crate) async fn run_collect_dry_run(
    config: &AppConfig,
    scope_filter: Option<&str>,
) -> anyhow::Result<()> {
    let scopes = viewtrend_core::load_scopes(&config.scopes_path)?;
    let selected = select_scopes(&scopes, scope_filter)?;
    let source = build_source(config)?;

    for scope in &selected {
        match source.fetch(scope).await {
            Ok(observations) => {
                println!(
                    "dry-run: {} -> {} observations",
                    scope.name,
                    observations.len()
                );
                for obs in observations.iter().take(5) {
                    println!("  {:<14}{:>14}  {}", obs.id, obs.metric, obs.title);
                }
            }
            Err(e) => eprintln!("error: fetch failed for {}: {e}", scope.name),
        }
    }

    Ok(())
}

/// Run one ingestion cycle per selected scope and record each report.
///
/// # Errors
///
/// Returns an error if `YOUTUBE_API_KEY` is missing, the scope filter is
/// unknown, or every selected scope failed.
pub(crate) async fn run_collect(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    scope_filter: Option<&str>,
) -> anyhow::Result<()> {
    let scopes = viewtrend_core::load_scopes(&config.scopes_path)?;
    let selected = select_scopes(&scopes, scope_filter)?;
    let source = build_source(config)?;

    let scheduler = IngestionScheduler::new(
        Arc::new(PgSnapshotStore::new(pool.clone())),
        Arc::new(source),
        Duration::from_secs(config.ingest_cycle_timeout_secs),
        config.ingest_max_concurrent_scopes,
    );
    let reports = scheduler.run_all(&selected).await;

    for report in &reports {
        record_best_effort(pool, report).await;
        print_report(report);
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        tracing::warn!(failed, total = reports.len(), "some scopes failed during collection");
    }
    if !reports.is_empty() && failed == reports.len() {
        anyhow::bail!("all {failed} scopes failed collection");
    }

    Ok(())
}

/// Record a run, logging (not propagating) a failed insert.
async fn record_best_effort(pool: &sqlx::PgPool, report: &CycleReport) {
    if let Err(e) = viewtrend_db::record_ingestion_run(pool, &report.to_new_run("cli")).await {
        tracing::error!(scope = %report.scope, error = %e, "failed to record ingestion run");
    }
}

fn print_report(report: &CycleReport) {
    match &report.error {
        None => println!(
            "{}: {} observations, {} written, {} duplicates at {}",
            report.scope,
            report.observations,
            report.snapshots_written,
            report.duplicates,
            report.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
        ),
        Some(error) => eprintln!(
            "error: {} {} ({} written): {error}",
            report.scope,
            report.status.as_str(),
            report.snapshots_written,
        ),
    }
}

//! Read-only report commands: growth rankings, latest snapshots, run history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use viewtrend_db::PgSnapshotStore;
use viewtrend_engine::GrowthEngine;

fn engine(pool: &sqlx::PgPool) -> GrowthEngine<PgSnapshotStore> {
    GrowthEngine::new(Arc::new(PgSnapshotStore::new(pool.clone())))
}

fn fmt_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Truncate to `max` characters for fixed-width columns.
pub(crate) fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('\u{2026}');
    clipped
}

/// Print the top `limit` items of `scope` by growth over `window_minutes`.
///
/// # Errors
///
/// Returns an error for a non-positive window or limit, or if the query fails.
pub(crate) async fn run_growth(
    pool: &sqlx::PgPool,
    scope: &str,
    window_minutes: i64,
    limit: i64,
) -> anyhow::Result<()> {
    let window = chrono::Duration::try_minutes(window_minutes)
        .ok_or_else(|| anyhow::anyhow!("window of {window_minutes} minutes is out of range"))?;
    let entries = engine(pool).rank(scope, window, limit).await?;

    if entries.is_empty() {
        println!("no growth data for scope '{scope}' (need at least two captures in the window)");
        return Ok(());
    }

    println!("{:<4}{:<14}{:>12}{:>14}  {:<17}TITLE", "#", "ITEM", "DELTA", "VIEWS", "SINCE");
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "{:<4}{:<14}{:>12}{:>14}  {:<17}{}",
            rank + 1,
            entry.item_id,
            entry.delta,
            entry.latest_metric,
            fmt_time(entry.baseline_at),
            clip(&entry.title, 60),
        );
    }

    Ok(())
}

/// Print the most-viewed items of `scope` at their latest capture.
///
/// # Errors
///
/// Returns an error for a non-positive limit or if the query fails.
pub(crate) async fn run_latest(pool: &sqlx::PgPool, scope: &str, limit: i64) -> anyhow::Result<()> {
    let entries = engine(pool).latest(scope, limit).await?;

    if entries.is_empty() {
        println!("no snapshots for scope '{scope}'; run `collect` first");
        return Ok(());
    }

    println!("{:<4}{:<14}{:>14}  {:<17}{:<24}TITLE", "#", "ITEM", "VIEWS", "CAPTURED", "CHANNEL");
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "{:<4}{:<14}{:>14}  {:<17}{:<24}{}",
            rank + 1,
            entry.item_id,
            entry.metric,
            fmt_time(entry.captured_at),
            clip(&entry.channel, 22),
            clip(&entry.title, 60),
        );
    }

    Ok(())
}

/// Print recent ingestion runs, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_runs(
    pool: &sqlx::PgPool,
    scope: Option<&str>,
    limit: i64,
) -> anyhow::Result<()> {
    let runs = viewtrend_db::list_ingestion_runs(pool, scope, limit).await?;

    if runs.is_empty() {
        println!("no ingestion runs recorded");
        return Ok(());
    }

    println!(
        "{:<17}{:<12}{:<11}{:<15}{:>6}{:>9}{:>6}  ERROR",
        "CAPTURED", "SCOPE", "TRIGGER", "STATUS", "OBS", "WRITTEN", "DUPS"
    );
    for run in &runs {
        println!(
            "{:<17}{:<12}{:<11}{:<15}{:>6}{:>9}{:>6}  {}",
            fmt_time(run.captured_at),
            clip(&run.scope, 11),
            run.trigger_source,
            run.status,
            run.observations,
            run.snapshots_written,
            run.duplicates,
            run.error_message.as_deref().map_or_else(String::new, |e| clip(e, 80)),
        );
    }

    Ok(())
}

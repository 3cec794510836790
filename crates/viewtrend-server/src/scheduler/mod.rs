//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring ingestion job when a metric source is configured.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use viewtrend_core::ScopesFile;
use viewtrend_db::DbError;
use viewtrend_engine::CycleReport;

use crate::api::{AppState, Ingestor};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(state: &AppState) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match &state.ingestor {
        Some(ingestor) => {
            register_ingest_job(
                &scheduler,
                &state.config.ingest_cron,
                state.pool.clone(),
                Arc::clone(ingestor),
                Arc::clone(&state.scopes),
            )
            .await?;
        }
        None => {
            tracing::warn!("scheduler: no metric source configured; ingestion job not registered");
        }
    }

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the periodic ingestion job on `cron` (six-field, seconds first).
async fn register_ingest_job(
    scheduler: &JobScheduler,
    cron: &str,
    pool: PgPool,
    ingestor: Arc<Ingestor>,
    scopes: Arc<ScopesFile>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = pool.clone();
        let ingestor = Arc::clone(&ingestor);
        let scopes = Arc::clone(&scopes);

        Box::pin(async move {
            tracing::info!(scopes = scopes.scopes.len(), "scheduler: starting ingestion run");
            run_ingest_job(&pool, &ingestor, &scopes).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: ingestion job registered");
    Ok(())
}

async fn run_ingest_job(pool: &PgPool, ingestor: &Ingestor, scopes: &ScopesFile) {
    let reports = ingestor.run_all(&scopes.scopes).await;

    let mut failed = 0usize;
    for report in &reports {
        if !report.is_success() {
            failed += 1;
        }
        if let Err(e) = record_report(pool, report, "scheduler").await {
            tracing::error!(
                scope = %report.scope,
                error = %e,
                "scheduler: failed to record ingestion run"
            );
        }
    }

    tracing::info!(
        scopes = reports.len(),
        failed,
        "scheduler: ingestion run complete"
    );
}

/// Persist one cycle report to the `ingestion_runs` audit table.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn record_report(
    pool: &PgPool,
    report: &CycleReport,
    trigger_source: &str,
) -> Result<(), DbError> {
    viewtrend_db::record_ingestion_run(pool, &report.to_new_run(trigger_source)).await?;
    Ok(())
}

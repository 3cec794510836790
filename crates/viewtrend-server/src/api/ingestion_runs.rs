use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use viewtrend_engine::CycleReport;

use crate::middleware::RequestId;
use crate::scheduler::record_report;

use super::{map_db_error, parse_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct IngestionRunsQuery {
    pub scope: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TriggerRequest {
    pub scope: String,
}

#[derive(Debug, Serialize)]
pub(super) struct IngestionRunItem {
    ingestion_run_id: Uuid,
    scope: String,
    trigger_source: String,
    status: String,
    captured_at: DateTime<Utc>,
    observations: i32,
    snapshots_written: i32,
    duplicates: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<viewtrend_db::IngestionRunRow> for IngestionRunItem {
    fn from(row: viewtrend_db::IngestionRunRow) -> Self {
        Self {
            ingestion_run_id: row.public_id,
            scope: row.scope,
            trigger_source: row.trigger_source,
            status: row.status,
            captured_at: row.captured_at,
            observations: row.observations,
            snapshots_written: row.snapshots_written,
            duplicates: row.duplicates,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_ingestion_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<IngestionRunsQuery>,
) -> Result<Json<ApiResponse<Vec<IngestionRunItem>>>, ApiError> {
    let limit = parse_limit(&req_id.0, query.limit)?;
    let rows = viewtrend_db::list_ingestion_runs(&state.pool, query.scope.as_deref(), limit)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(IngestionRunItem::from).collect();
    Ok(ApiResponse::new(data, req_id.0))
}

/// Runs one ingestion cycle for a configured scope right now.
///
/// Source failures still produce a recorded run and a 200 response; the
/// report's `status` says what happened.
pub(super) async fn trigger_ingestion_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CycleReport>>), ApiError> {
    let Some(scope) = state.scopes.find(body.scope.trim()) else {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("scope '{}' is not configured", body.scope),
        ));
    };
    let Some(ingestor) = state.ingestor.as_ref() else {
        return Err(ApiError::new(
            req_id.0,
            "service_unavailable",
            "ingestion is disabled: YOUTUBE_API_KEY is not configured",
        ));
    };

    let report = ingestor.run_cycle(scope).await;
    if let Err(e) = record_report(&state.pool, &report, "api").await {
        return Err(map_db_error(req_id.0, &e));
    }

    Ok((StatusCode::OK, ApiResponse::new(report, req_id.0)))
}

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Duration;
use serde::Deserialize;
use viewtrend_engine::{GrowthEntry, LatestEntry};

use crate::middleware::RequestId;

use super::{map_engine_error, parse_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct GrowthQuery {
    pub window_minutes: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LatestQuery {
    pub limit: Option<i64>,
}

pub(super) async fn get_growth(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(scope): Path<String>,
    Query(query): Query<GrowthQuery>,
) -> Result<Json<ApiResponse<Vec<GrowthEntry>>>, ApiError> {
    let limit = parse_limit(&req_id.0, query.limit)?;
    let window_minutes = query
        .window_minutes
        .unwrap_or(state.config.default_window_minutes);
    if window_minutes <= 0 {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("window_minutes must be positive, got {window_minutes}"),
        ));
    }
    let window = Duration::try_minutes(window_minutes).ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("window_minutes {window_minutes} is out of range"),
        )
    })?;

    let data = state
        .growth
        .rank(&scope, window, limit)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(data, req_id.0))
}

pub(super) async fn get_latest(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(scope): Path<String>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<ApiResponse<Vec<LatestEntry>>>, ApiError> {
    let limit = parse_limit(&req_id.0, query.limit)?;

    let data = state
        .growth
        .latest(&scope, limit)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(data, req_id.0))
}

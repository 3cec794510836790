//! Live queries against the YouTube API. Nothing here touches the snapshot
//! store; results reflect the API at request time.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use viewtrend_core::{validate_scope, ScopeConfig, SourceError};
use viewtrend_youtube::{LiveVideo, YoutubeError};

use crate::middleware::RequestId;

use super::{parse_limit, ApiError, ApiResponse, AppState};

const LIVE_SCOPE_NAME: &str = "live";

#[derive(Debug, Deserialize)]
pub(super) struct LiveTrendingQuery {
    pub scope: Option<String>,
    /// Comma-separated region codes, used when `scope` is absent.
    pub regions: Option<String>,
    pub limit: Option<i64>,
    pub shorts: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LiveSearchRequest {
    pub keyword: String,
    pub scope: Option<String>,
    pub regions: Option<Vec<String>>,
    pub days: Option<u32>,
    pub limit: Option<i64>,
    pub shorts: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(super) struct LiveResults {
    regions: Vec<String>,
    items: Vec<LiveVideo>,
}

/// Current trending charts for a configured scope or an explicit region list.
pub(super) async fn get_live_trending(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<LiveTrendingQuery>,
) -> Result<Json<ApiResponse<LiveResults>>, ApiError> {
    let regions = query.regions.as_deref().map(split_regions);
    let mut scope = resolve_scope(&state, &req_id.0, query.scope.as_deref(), regions)?;
    scope.keyword = None;
    scope.published_within_days = None;
    apply_overrides(&mut scope, &req_id.0, query.limit, query.shorts)?;

    run_live(&state, req_id, scope).await
}

/// Keyword search, most-viewed first, optionally limited to recent uploads.
pub(super) async fn post_live_search(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<LiveSearchRequest>,
) -> Result<Json<ApiResponse<LiveResults>>, ApiError> {
    let keyword = body.keyword.trim();
    if keyword.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "keyword must be non-empty",
        ));
    }

    let mut scope = resolve_scope(&state, &req_id.0, body.scope.as_deref(), body.regions)?;
    scope.keyword = Some(keyword.to_owned());
    if body.days.is_some() {
        scope.published_within_days = body.days;
    }
    apply_overrides(&mut scope, &req_id.0, body.limit, body.shorts)?;

    run_live(&state, req_id, scope).await
}

async fn run_live(
    state: &AppState,
    req_id: RequestId,
    scope: ScopeConfig,
) -> Result<Json<ApiResponse<LiveResults>>, ApiError> {
    validate_scope(&scope)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let Some(source) = state.source.as_ref() else {
        return Err(ApiError::new(
            req_id.0,
            "service_unavailable",
            "live queries are disabled: YOUTUBE_API_KEY is not configured",
        ));
    };

    let items = source
        .live(&scope)
        .await
        .map_err(|e| map_youtube_error(req_id.0.clone(), e))?;

    Ok(ApiResponse::new(
        LiveResults {
            regions: scope.regions,
            items,
        },
        req_id.0,
    ))
}

/// A configured scope when named, otherwise an ad-hoc scope over `regions`.
fn resolve_scope(
    state: &AppState,
    request_id: &str,
    name: Option<&str>,
    regions: Option<Vec<String>>,
) -> Result<ScopeConfig, ApiError> {
    let mut scope = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => state.scopes.find(name).cloned().ok_or_else(|| {
            ApiError::new(
                request_id,
                "not_found",
                format!("scope '{name}' is not configured"),
            )
        })?,
        None => ScopeConfig {
            name: LIVE_SCOPE_NAME.to_owned(),
            regions: Vec::new(),
            keyword: None,
            limit: 0,
            shorts: None,
            published_within_days: None,
        },
    };

    if let Some(regions) = regions {
        scope.regions = regions
            .iter()
            .map(|r| r.trim().to_ascii_uppercase())
            .filter(|r| !r.is_empty())
            .collect();
    }
    if scope.regions.is_empty() {
        return Err(ApiError::new(
            request_id,
            "validation_error",
            "either scope or at least one region is required",
        ));
    }
    Ok(scope)
}

fn apply_overrides(
    scope: &mut ScopeConfig,
    request_id: &str,
    limit: Option<i64>,
    shorts: Option<bool>,
) -> Result<(), ApiError> {
    if limit.is_some() || scope.limit == 0 {
        let limit = parse_limit(request_id, limit)?;
        scope.limit = u32::try_from(limit).map_err(|_| {
            ApiError::new(
                request_id,
                "validation_error",
                format!("limit {limit} is out of range"),
            )
        })?;
    }
    if shorts.is_some() {
        scope.shorts = shorts;
    }
    Ok(())
}

fn split_regions(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_owned).collect()
}

fn map_youtube_error(request_id: String, error: YoutubeError) -> ApiError {
    tracing::warn!(error = %error, "live YouTube query failed");
    match SourceError::from(error) {
        SourceError::Configuration(message) => {
            ApiError::new(request_id, "service_unavailable", message)
        }
        SourceError::Transient(message) => ApiError::new(request_id, "upstream_error", message),
    }
}

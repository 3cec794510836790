mod growth;
mod ingestion_runs;
mod items;
mod live;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use viewtrend_core::{AppConfig, ScopesFile};
use viewtrend_db::PgSnapshotStore;
use viewtrend_engine::{EngineError, GrowthEngine, IngestionScheduler};
use viewtrend_youtube::YoutubeSource;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
    REQUEST_ID_HEADER,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type Ingestor = IngestionScheduler<PgSnapshotStore, YoutubeSource>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub scopes: Arc<ScopesFile>,
    pub store: Arc<PgSnapshotStore>,
    pub growth: GrowthEngine<PgSnapshotStore>,
    /// `None` when no YouTube API key is configured; the ingestor shares it.
    pub source: Option<Arc<YoutubeSource>>,
    pub ingestor: Option<Arc<Ingestor>>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Arc<AppConfig>,
        scopes: Arc<ScopesFile>,
        source: Option<YoutubeSource>,
    ) -> Self {
        let store = Arc::new(PgSnapshotStore::new(pool.clone()));
        let source = source.map(Arc::new);
        let ingestor = source.as_ref().map(|source| {
            Arc::new(IngestionScheduler::new(
                Arc::clone(&store),
                Arc::clone(source),
                Duration::from_secs(config.ingest_cycle_timeout_secs),
                config.ingest_max_concurrent_scopes,
            ))
        });
        Self {
            pool,
            growth: GrowthEngine::new(Arc::clone(&store)),
            store,
            config,
            scopes,
            source,
            ingestor,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    ingestion: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Default 50, capped at 200; zero or negative is a validation error.
pub(super) fn parse_limit(request_id: &str, limit: Option<i64>) -> Result<i64, ApiError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(n) if n <= 0 => Err(ApiError::new(
            request_id,
            "validation_error",
            format!("limit must be positive, got {n}"),
        )),
        Some(n) => Ok(n.min(MAX_LIMIT)),
    }
}

pub(super) fn map_db_error(request_id: String, error: &viewtrend_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::InvalidArgument(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        EngineError::Store(e) => map_db_error(request_id, e),
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/scopes/{scope}/growth", get(growth::get_growth))
        .route("/api/v1/scopes/{scope}/latest", get(growth::get_latest))
        .route("/api/v1/scopes/{scope}/items/{item_id}/history", get(items::get_item_history))
        .route(
            "/api/v1/ingestion-runs",
            get(ingestion_runs::list_ingestion_runs).post(ingestion_runs::trigger_ingestion_run),
        )
        .route("/api/v1/live/trending", get(live::get_live_trending))
        .route("/api/v1/live/search", post(live::post_live_search))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(rate_limit, enforce_rate_limit))
                .layer(axum::middleware::from_fn_with_state(auth, require_bearer_auth)),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ))
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let ingestion = if state.ingestor.is_some() {
        "enabled"
    } else {
        "disabled"
    };

    match viewtrend_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            ApiResponse::new(
                HealthData {
                    status: "ok",
                    database: "ok",
                    ingestion,
                },
                req_id.0,
            ),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::new(
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                        ingestion,
                    },
                    req_id.0,
                ),
            )
        }
    }
}

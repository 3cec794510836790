use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use viewtrend_db::SnapshotStore;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct HistoryPoint {
    captured_at: DateTime<Utc>,
    metric: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct ItemHistory {
    item_id: String,
    scope: String,
    title: String,
    channel: String,
    thumbnail: Option<String>,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    points: Vec<HistoryPoint>,
}

pub(super) async fn get_item_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((scope, item_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ItemHistory>>, ApiError> {
    let points = state
        .store
        .history(&scope, &item_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if points.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no snapshots for item '{item_id}' in scope '{scope}'"),
        ));
    }

    let mut items = state
        .store
        .items(std::slice::from_ref(&item_id))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let item = items.remove(&item_id);

    let data = ItemHistory {
        title: item.as_ref().map(|i| i.title.clone()).unwrap_or_default(),
        channel: item.as_ref().map(|i| i.channel.clone()).unwrap_or_default(),
        thumbnail: item.as_ref().and_then(|i| i.thumbnail.clone()),
        first_seen: item.as_ref().map(|i| i.first_seen),
        last_seen: item.as_ref().map(|i| i.last_seen),
        points: points
            .into_iter()
            .map(|p| HistoryPoint {
                captured_at: p.captured_at,
                metric: p.metric,
            })
            .collect(),
        item_id,
        scope,
    };

    Ok(ApiResponse::new(data, req_id.0))
}

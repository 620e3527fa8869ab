use crate::progress::{ProgressAggregate, ProgressSnapshot};
use crate::server::{ServerEvent, ServerState};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub(crate) struct ProgressQuery {
    user_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressResponse {
    user_id: String,
    #[serde(flatten)]
    aggregate: ProgressAggregate,
    refreshed_at: Option<DateTime<Utc>>,
    /// True when serving a cached snapshot no live refresh has confirmed yet.
    stale: bool,
}

fn to_response(user_id: String, snapshot: ProgressSnapshot) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        user_id,
        stale: snapshot.generation == 0,
        refreshed_at: snapshot.refreshed_at,
        aggregate: snapshot.aggregate,
    })
}

/// `GET /api/progress?user_id=...` — the current aggregate, global plus
/// per-step. Computes one on first touch; after that the cached snapshot is
/// served and kept current by the refresh loop. Backend failures degrade to
/// the last known (or zero) aggregate — this endpoint never 5xxs for them.
pub(crate) async fn get_progress(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    let tracker = state.tracker_for(&query.user_id).await;
    let snapshot = if tracker.is_fresh().await {
        tracker.snapshot().await
    } else {
        tracker.refresh().await
    };
    to_response(query.user_id, snapshot)
}

/// `POST /api/progress/refresh?user_id=...` — explicit full recompute (the
/// user-facing "refresh" action).
pub(crate) async fn refresh_progress(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    let tracker = state.tracker_for(&query.user_id).await;
    let snapshot = tracker.refresh().await;
    let _ = state.events_tx.send(ServerEvent::ProgressRefreshed {
        user_id: query.user_id.clone(),
    });
    to_response(query.user_id, snapshot)
}

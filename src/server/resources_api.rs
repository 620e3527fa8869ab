use crate::resources::{ResourceRecord, SaveOutcome};
use crate::server::{ServerEvent, ServerState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

#[derive(Deserialize)]
pub(crate) struct ResourceQuery {
    user_id: String,
    step_id: u32,
    substep_title: Option<String>,
    resource_type: Option<String>,
}

/// `GET /api/resources?user_id=&step_id=[&substep_title=][&resource_type=]`
/// — the most recent matching record. The lookup tolerates legacy raw
/// substep titles still present in storage; omitting `substep_title`
/// selects the step's main content.
pub(crate) async fn get_resource(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ResourceQuery>,
) -> impl IntoResponse {
    match state
        .store
        .find_resource(
            &query.user_id,
            query.step_id,
            query.substep_title.as_deref(),
            query.resource_type.as_deref(),
        )
        .await
    {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!("Resource fetch failed: {}", err);
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct SaveResourceBody {
    user_id: String,
    step_id: u32,
    #[serde(default)]
    substep_title: Option<String>,
    resource_type: String,
    #[serde(default)]
    content: Value,
}

#[derive(Serialize)]
struct SaveResourceResponse {
    status: SaveOutcome,
    record: ResourceRecord,
}

/// `PUT /api/resources` — save a record. The substep title is normalized
/// before it becomes the storage key; a backend failure degrades to the
/// offline queue rather than losing the save.
pub(crate) async fn put_resource(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<SaveResourceBody>,
) -> impl IntoResponse {
    let record = ResourceRecord {
        id: None,
        user_id: body.user_id,
        step_id: body.step_id,
        substep_title: body.substep_title,
        resource_type: body.resource_type,
        content: body.content,
        created_at: None,
        updated_at: chrono::Utc::now(),
    };

    match state.store.save_resource(record).await {
        Ok((outcome, record)) => {
            let event = match outcome {
                SaveOutcome::Saved => ServerEvent::ResourceSaved {
                    user_id: record.user_id.clone(),
                    step_id: record.step_id,
                    substep_title: record.substep_title.clone(),
                },
                SaveOutcome::Queued => ServerEvent::ResourceQueued {
                    user_id: record.user_id.clone(),
                    step_id: record.step_id,
                    substep_title: record.substep_title.clone(),
                },
            };
            let _ = state.events_tx.send(event);
            Json(SaveResourceResponse {
                status: outcome,
                record,
            })
            .into_response()
        }
        Err(err) => {
            warn!("Resource save failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct FlushQuery {
    user_id: String,
}

/// `POST /api/resources/flush?user_id=...` — retry queued offline saves.
pub(crate) async fn flush_resources(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<FlushQuery>,
) -> impl IntoResponse {
    match state.store.flush_queue(&query.user_id).await {
        Ok(report) => {
            let _ = state.events_tx.send(ServerEvent::QueueFlushed {
                user_id: query.user_id,
                flushed: report.flushed,
                remaining: report.remaining,
            });
            Json(report).into_response()
        }
        Err(err) => {
            warn!("Queue flush failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

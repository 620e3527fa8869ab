mod journey_api;
mod progress_api;
mod resources_api;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::progress::ProgressTracker;
use crate::resources::cache::ResourceCache;
use crate::resources::ResourceStore;
use axum::{
    extract::State,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use journey_api::get_journey;
use progress_api::{get_progress, refresh_progress};
use resources_api::{flush_resources, get_resource, put_resource};

pub struct ServerState {
    pub client: Arc<BackendClient>,
    pub cache: Arc<ResourceCache>,
    pub store: ResourceStore,
    pub trackers: Mutex<HashMap<String, Arc<ProgressTracker>>>,
    pub events_tx: broadcast::Sender<ServerEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ProgressRefreshed {
        user_id: String,
    },
    ResourceSaved {
        user_id: String,
        step_id: u32,
        substep_title: Option<String>,
    },
    ResourceQueued {
        user_id: String,
        step_id: u32,
        substep_title: Option<String>,
    },
    QueueFlushed {
        user_id: String,
        flushed: usize,
        remaining: usize,
    },
}

impl ServerState {
    /// Tracker for a user, created on first touch. Tracked users are picked
    /// up by the background refresh loop from then on.
    pub async fn tracker_for(&self, user_id: &str) -> Arc<ProgressTracker> {
        let mut trackers = self.trackers.lock().await;
        trackers
            .entry(user_id.to_string())
            .or_insert_with(|| {
                Arc::new(ProgressTracker::new(
                    user_id.to_string(),
                    self.client.clone(),
                    self.cache.clone(),
                ))
            })
            .clone()
    }
}

pub async fn start_server(config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    let port = port_override.unwrap_or(config.server.port);
    info!("fundroad server starting on port {}...", port);

    let client = Arc::new(BackendClient::new(&config.backend)?);
    let cache = Arc::new(ResourceCache::new());
    let store = ResourceStore::new(client.clone(), cache.clone());
    let (events_tx, _) = broadcast::channel(256);

    let refresh_interval = Duration::from_secs(config.progress.refresh_interval_secs);
    let state = Arc::new(ServerState {
        client,
        cache,
        store,
        trackers: Mutex::new(HashMap::new()),
        events_tx,
    });

    // The refresh loop's lifetime is tied to the server's: aborted on exit.
    let refresh_state = state.clone();
    let refresh_task = tokio::spawn(refresh_loop(refresh_state, refresh_interval));

    let app = Router::new()
        .route("/api/journey", get(get_journey))
        .route("/api/progress", get(get_progress))
        .route("/api/progress/refresh", post(refresh_progress))
        .route("/api/resources", get(get_resource).put(put_resource))
        .route("/api/resources/flush", post(flush_resources))
        .route("/api/events", get(events_handler))
        .route("/api/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!(
        "Server running on http://localhost:{}",
        listener.local_addr()?.port()
    );

    let result = axum::serve(listener, app).await;
    refresh_task.abort();
    result?;
    Ok(())
}

/// Background loop recomputing every tracked user's aggregate on a fixed
/// interval. Always a full recompute; fetch failures are absorbed inside
/// `refresh`, so the loop itself never stops.
async fn refresh_loop(state: Arc<ServerState>, interval: Duration) {
    let mut ticker = time::interval(interval);
    // The first tick fires immediately; nothing is tracked yet.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let trackers: Vec<Arc<ProgressTracker>> = {
            let guard = state.trackers.lock().await;
            guard.values().cloned().collect()
        };
        if trackers.is_empty() {
            continue;
        }

        debug!("Refreshing progress for {} tracked user(s)", trackers.len());
        for tracker in trackers {
            tracker.refresh().await;
            let _ = state.events_tx.send(ServerEvent::ProgressRefreshed {
                user_id: tracker.user_id().to_string(),
            });
        }
    }
}

async fn events_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        let event = msg.ok()?;
        let data = serde_json::to_string(&event).unwrap_or_default();
        Some(Ok(Event::default().data(data)))
    });

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

async fn health_handler() -> impl IntoResponse {
    axum::Json(json!({ "ok": true }))
}

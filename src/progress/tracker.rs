//! On-demand and scheduled recomputation of a user's progress aggregate.
//!
//! A refresh may be triggered while a previous one is still in flight (the
//! UI polls and the user can hit "refresh" at the same time). Each refresh
//! takes a generation ticket before fetching; a result only installs if no
//! newer result landed first, so a slow stale response can never overwrite
//! a fresher aggregate.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::BackendClient;
use crate::progress::{aggregate_records, ProgressAggregate};
use crate::resources::cache::ResourceCache;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub aggregate: ProgressAggregate,
    #[serde(default)]
    pub generation: u64,
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
}

pub struct ProgressTracker {
    user_id: String,
    client: Arc<BackendClient>,
    cache: Arc<ResourceCache>,
    ticket: AtomicU64,
    snapshot: RwLock<ProgressSnapshot>,
}

impl ProgressTracker {
    /// A new tracker starts from the persisted snapshot when one exists, so
    /// the progress UI shows stale-but-valid numbers if the backend is down
    /// on startup. The persisted generation is reset to zero: any live
    /// refresh in this process supersedes it.
    pub fn new(user_id: String, client: Arc<BackendClient>, cache: Arc<ResourceCache>) -> Self {
        let initial = cache
            .load_snapshot(&user_id)
            .map(|mut snapshot| {
                snapshot.generation = 0;
                snapshot
            })
            .unwrap_or_default();
        Self {
            user_id,
            client,
            cache,
            ticket: AtomicU64::new(0),
            snapshot: RwLock::new(initial),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Whether any refresh has completed in this process.
    pub async fn is_fresh(&self) -> bool {
        self.snapshot.read().await.generation > 0
    }

    /// Full recompute from the backend. A fetch failure logs a warning and
    /// leaves the previous snapshot in place; progress display must never
    /// fail outright, so errors stop here.
    pub async fn refresh(&self) -> ProgressSnapshot {
        let generation = self.ticket.fetch_add(1, Ordering::SeqCst) + 1;
        match self.try_fetch().await {
            Ok(aggregate) => self.install(generation, aggregate).await,
            Err(err) => {
                tracing::warn!(
                    "Progress refresh failed for user {}: {}",
                    self.user_id,
                    err
                );
                self.snapshot.read().await.clone()
            }
        }
    }

    async fn try_fetch(&self) -> Result<ProgressAggregate> {
        let records = self.client.fetch_resources(&self.user_id).await?;
        Ok(aggregate_records(&records))
    }

    /// Install a computed aggregate unless a newer refresh already landed.
    async fn install(&self, generation: u64, aggregate: ProgressAggregate) -> ProgressSnapshot {
        let mut guard = self.snapshot.write().await;
        if generation >= guard.generation {
            *guard = ProgressSnapshot {
                aggregate,
                generation,
                refreshed_at: Some(Utc::now()),
            };
            if let Err(err) = self.cache.save_snapshot(&self.user_id, &*guard) {
                tracing::warn!(
                    "Failed to persist progress snapshot for user {}: {}",
                    self.user_id,
                    err
                );
            }
        } else {
            tracing::debug!(
                "Discarding superseded progress refresh for user {} (generation {} < {})",
                self.user_id,
                generation,
                guard.generation
            );
        }
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::progress::ProgressAggregate;

    fn test_tracker(cache_root: std::path::PathBuf) -> ProgressTracker {
        let config = BackendConfig {
            url: "http://127.0.0.1:1".to_string(),
            api_key: None,
            resources_table: "journey_resources".to_string(),
            request_timeout_secs: 1,
        };
        ProgressTracker::new(
            "user-1".to_string(),
            Arc::new(BackendClient::new(&config).unwrap()),
            Arc::new(ResourceCache::with_root(cache_root)),
        )
    }

    fn aggregate(total: u64, filled: u64) -> ProgressAggregate {
        ProgressAggregate {
            total_inputs: total,
            filled_inputs: filled,
            progress_percentage: if total == 0 {
                0
            } else {
                ((filled as f64 / total as f64) * 100.0).round() as u8
            },
            details_by_step: Default::default(),
        }
    }

    #[tokio::test]
    async fn stale_result_does_not_overwrite_newer() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = test_tracker(dir.path().join("cache"));

        // Generation 2 lands first, then the slow generation-1 response.
        tracker.install(2, aggregate(10, 5)).await;
        tracker.install(1, aggregate(4, 1)).await;

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.aggregate.total_inputs, 10);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = test_tracker(dir.path().join("cache"));

        tracker.install(1, aggregate(6, 3)).await;
        // The backend URL is unreachable, so this refresh fails.
        let snapshot = tracker.refresh().await;
        assert_eq!(snapshot.aggregate.total_inputs, 6);
        assert_eq!(snapshot.aggregate.progress_percentage, 50);
    }

    #[tokio::test]
    async fn new_tracker_restores_persisted_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");

        let tracker = test_tracker(root.clone());
        tracker.install(3, aggregate(8, 2)).await;
        drop(tracker);

        let restored = test_tracker(root);
        let snapshot = restored.snapshot().await;
        assert_eq!(snapshot.aggregate.total_inputs, 8);
        // Restored snapshots are pre-process history: generation resets.
        assert_eq!(snapshot.generation, 0);
        assert!(!restored.is_fresh().await);
    }
}

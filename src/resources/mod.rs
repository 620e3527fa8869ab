pub mod cache;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::BackendClient;
use crate::journey::{normalize_substep_title, possible_titles};
use cache::ResourceCache;

/// One persisted unit of user-entered form content, scoped by user, step,
/// substep, and resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub step_id: u32,
    #[serde(default)]
    pub substep_title: Option<String>,
    pub resource_type: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    /// Upsert landed on the backend.
    Saved,
    /// Backend unreachable; the record sits in the offline queue.
    Queued,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FlushReport {
    pub flushed: usize,
    pub remaining: usize,
}

/// Read/write access to resource records: backend first, offline queue as
/// the fallback. Every title that reaches storage or a lookup goes through
/// the normalizer here, so independent call sites stay consistent.
pub struct ResourceStore {
    client: Arc<BackendClient>,
    cache: Arc<ResourceCache>,
}

impl ResourceStore {
    pub fn new(client: Arc<BackendClient>, cache: Arc<ResourceCache>) -> Self {
        Self { client, cache }
    }

    /// Fetch the most recent record for a substep, tolerating legacy raw
    /// title forms in storage.
    ///
    /// `substep_title: None` selects the step's main content (records with
    /// a null title). For a named substep the backend is queried with the
    /// whole [`possible_titles`] set, since old records may still sit under
    /// any of the raw spellings.
    pub async fn find_resource(
        &self,
        user_id: &str,
        step_id: u32,
        substep_title: Option<&str>,
        resource_type: Option<&str>,
    ) -> Result<Option<ResourceRecord>> {
        let mut records = match substep_title {
            Some(title) => {
                let titles = possible_titles(step_id, title);
                self.client
                    .fetch_substep_resources(user_id, step_id, &titles)
                    .await?
            }
            None => self
                .client
                .fetch_step_resources(user_id, step_id)
                .await?
                .into_iter()
                .filter(|record| record.substep_title.is_none())
                .collect(),
        };

        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records.into_iter().find(|record| {
            resource_type.is_none() || resource_type == Some(record.resource_type.as_str())
        }))
    }

    /// Save a record: normalize the substep title (the storage key), stamp
    /// `updated_at`, upsert. If the backend is unreachable the record goes
    /// to the offline queue instead; the save never fails outright.
    pub async fn save_resource(
        &self,
        mut record: ResourceRecord,
    ) -> Result<(SaveOutcome, ResourceRecord)> {
        if let Some(title) = record.substep_title.take() {
            let normalized = normalize_substep_title(record.step_id, &title);
            record.substep_title = if normalized.is_empty() {
                None
            } else {
                Some(normalized)
            };
        }
        record.updated_at = Utc::now();

        match self.client.upsert_resource(&record).await {
            Ok(saved) => Ok((SaveOutcome::Saved, saved)),
            Err(err) => {
                tracing::warn!(
                    "Upsert failed for user {} step {} ({}); queueing offline",
                    record.user_id,
                    record.step_id,
                    err
                );
                let queued = self.cache.enqueue(record)?;
                Ok((SaveOutcome::Queued, queued))
            }
        }
    }

    /// Retry every queued offline save for a user.
    pub async fn flush_queue(&self, user_id: &str) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for entry in self.cache.list_queued(user_id)? {
            let record = cache::strip_queue_metadata(entry.record.clone());
            match self.client.upsert_resource(&record).await {
                Ok(_) => {
                    self.cache.remove_queued(user_id, &entry.key)?;
                    report.flushed += 1;
                }
                Err(err) => {
                    tracing::debug!("Queued save still failing ({}): {}", entry.key, err);
                    report.remaining += 1;
                }
            }
        }
        if report.flushed > 0 {
            tracing::info!(
                "Flushed {} queued save(s) for user {} ({} remaining)",
                report.flushed,
                user_id,
                report.remaining
            );
        }
        Ok(report)
    }
}

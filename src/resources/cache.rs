//! File-based local cache: the last computed progress snapshot per user and
//! the offline save queue. One JSON file per entry under
//! `~/.fundroad/cache/<user>/`.

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

use crate::progress::ProgressSnapshot;
use crate::resources::ResourceRecord;

/// Key under which queue metadata is stored inside `content`. The leading
/// underscore keeps it invisible to the input counter.
const QUEUED_AT_KEY: &str = "_queued_at";

#[derive(Debug, Clone)]
pub struct QueuedEntry {
    pub key: String,
    pub record: ResourceRecord,
}

pub struct ResourceCache {
    root: PathBuf,
}

/// Encode an opaque user id into a directory-safe name.
fn encode_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            root: crate::paths::cache_dir(),
        }
    }

    #[cfg(test)]
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(encode_user_id(user_id))
    }

    fn queue_dir(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join("queue")
    }

    pub fn save_snapshot(&self, user_id: &str, snapshot: &ProgressSnapshot) -> Result<()> {
        let dir = self.user_dir(user_id);
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(dir.join("snapshot.json"), json)?;
        Ok(())
    }

    pub fn load_snapshot(&self, user_id: &str) -> Option<ProgressSnapshot> {
        let path = self.user_dir(user_id).join("snapshot.json");
        if !path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return None,
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Skipping corrupt snapshot at {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Queue a record for a later retry, stamping `_queued_at` into its
    /// content. A previously queued entry for the same substep and resource
    /// type is replaced, matching titles through the normalizer.
    pub fn enqueue(&self, mut record: ResourceRecord) -> Result<ResourceRecord> {
        if let Value::Object(fields) = &mut record.content {
            fields.insert(
                QUEUED_AT_KEY.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        let user_id = record.user_id.clone();
        for existing in self.list_queued(&user_id)? {
            if existing.record.step_id == record.step_id
                && existing.record.resource_type == record.resource_type
                && same_substep(&existing.record, &record)
            {
                self.remove_queued(&user_id, &existing.key)?;
            }
        }

        let dir = self.queue_dir(&user_id);
        fs::create_dir_all(&dir)?;
        let key = uuid::Uuid::new_v4().to_string();
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(dir.join(format!("{}.json", key)), json)?;
        Ok(record)
    }

    pub fn list_queued(&self, user_id: &str) -> Result<Vec<QueuedEntry>> {
        let dir = self.queue_dir(user_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(_) => continue,
            };
            match serde_json::from_str::<ResourceRecord>(&content) {
                Ok(record) => {
                    let key = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();
                    entries.push(QueuedEntry { key, record });
                }
                Err(e) => {
                    tracing::warn!("Skipping corrupt queue entry at {}: {}", path.display(), e);
                }
            }
        }
        entries.sort_by(|a, b| a.record.updated_at.cmp(&b.record.updated_at));
        Ok(entries)
    }

    pub fn remove_queued(&self, user_id: &str, key: &str) -> Result<()> {
        let path = self.queue_dir(user_id).join(format!("{}.json", key));
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn queued_count(&self, user_id: &str) -> usize {
        self.list_queued(user_id).map(|q| q.len()).unwrap_or(0)
    }
}

fn same_substep(a: &ResourceRecord, b: &ResourceRecord) -> bool {
    match (&a.substep_title, &b.substep_title) {
        (None, None) => true,
        (Some(left), Some(right)) => crate::journey::titles_match(a.step_id, left, right),
        _ => false,
    }
}

/// Remove queue bookkeeping before a record goes back to the backend.
pub fn strip_queue_metadata(mut record: ResourceRecord) -> ResourceRecord {
    if let Value::Object(fields) = &mut record.content {
        fields.shift_remove(QUEUED_AT_KEY);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSnapshot;
    use chrono::Utc;
    use serde_json::json;

    fn temp_cache() -> (ResourceCache, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResourceCache::with_root(dir.path().join("cache"));
        (cache, dir)
    }

    fn record(substep_title: Option<&str>, content: serde_json::Value) -> ResourceRecord {
        ResourceRecord {
            id: None,
            user_id: "user-1".to_string(),
            step_id: 1,
            substep_title: substep_title.map(|s| s.to_string()),
            resource_type: "form".to_string(),
            content,
            created_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_roundtrip() {
        let (cache, _dir) = temp_cache();
        assert!(cache.load_snapshot("user-1").is_none());

        let snapshot = ProgressSnapshot::default();
        cache.save_snapshot("user-1", &snapshot).unwrap();
        let loaded = cache.load_snapshot("user-1").unwrap();
        assert_eq!(loaded.aggregate, snapshot.aggregate);
    }

    #[test]
    fn enqueue_stamps_metadata_and_strip_removes_it() {
        let (cache, _dir) = temp_cache();
        let queued = cache
            .enqueue(record(Some("Recherche utilisateur"), json!({ "a": "x" })))
            .unwrap();
        assert!(queued.content.get(QUEUED_AT_KEY).is_some());

        let stripped = strip_queue_metadata(queued);
        assert!(stripped.content.get(QUEUED_AT_KEY).is_none());
        assert_eq!(stripped.content, json!({ "a": "x" }));
    }

    #[test]
    fn enqueue_replaces_same_substep_across_legacy_titles() {
        let (cache, _dir) = temp_cache();
        cache
            .enqueue(record(Some("user_research"), json!({ "a": "old" })))
            .unwrap();
        cache
            .enqueue(record(Some("Recherche utilisateur"), json!({ "a": "new" })))
            .unwrap();

        let queued = cache.list_queued("user-1").unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].record.content.get("a").unwrap(), "new");
    }

    #[test]
    fn remove_queued_clears_entry() {
        let (cache, _dir) = temp_cache();
        cache.enqueue(record(None, json!({ "a": "x" }))).unwrap();
        let queued = cache.list_queued("user-1").unwrap();
        assert_eq!(queued.len(), 1);
        cache.remove_queued("user-1", &queued[0].key).unwrap();
        assert_eq!(cache.queued_count("user-1"), 0);
    }

    #[test]
    fn queue_metadata_does_not_affect_counting() {
        let (cache, _dir) = temp_cache();
        let queued = cache
            .enqueue(record(None, json!({ "a": "x", "b": "" })))
            .unwrap();
        let count = crate::progress::count_inputs(&queued.content);
        assert_eq!(count.total_inputs, 2);
        assert_eq!(count.filled_inputs, 1);
    }
}

use std::collections::{BTreeMap, HashMap};

use crate::progress::counter::{count_inputs, InputCount};
use crate::progress::{ProgressAggregate, StepProgress};
use crate::resources::ResourceRecord;

fn percentage(filled: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((filled as f64 / total as f64) * 100.0).round() as u8
}

/// Full recompute of a user's progress from their resource records.
///
/// Duplicate records for the same `(step_id, substep_title, resource_type)`
/// key are a tolerated storage anomaly: only the one with the latest
/// `updated_at` is counted. Records with null or malformed content
/// contribute `{0, 0}` through the counter's base case, so the result is
/// always valid: zero records means an all-zero aggregate, never an error.
pub fn aggregate_records(records: &[ResourceRecord]) -> ProgressAggregate {
    let mut latest: HashMap<(u32, String, String), &ResourceRecord> = HashMap::new();
    for record in records {
        let key = (
            record.step_id,
            record.substep_title.clone().unwrap_or_default(),
            record.resource_type.clone(),
        );
        let newer = match latest.get(&key) {
            Some(existing) => record.updated_at > existing.updated_at,
            None => true,
        };
        if newer {
            latest.insert(key, record);
        }
    }

    let mut global = InputCount::default();
    let mut by_step: BTreeMap<u32, InputCount> = BTreeMap::new();
    for record in latest.values() {
        let count = count_inputs(&record.content);
        global.total_inputs += count.total_inputs;
        global.filled_inputs += count.filled_inputs;
        let step = by_step.entry(record.step_id).or_default();
        step.total_inputs += count.total_inputs;
        step.filled_inputs += count.filled_inputs;
    }

    ProgressAggregate {
        total_inputs: global.total_inputs,
        filled_inputs: global.filled_inputs,
        progress_percentage: percentage(global.filled_inputs, global.total_inputs),
        details_by_step: by_step
            .into_iter()
            .map(|(step_id, count)| {
                (
                    step_id,
                    StepProgress {
                        total_inputs: count.total_inputs,
                        filled_inputs: count.filled_inputs,
                        progress_percentage: percentage(count.filled_inputs, count.total_inputs),
                    },
                )
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(
        step_id: u32,
        substep_title: Option<&str>,
        resource_type: &str,
        content: serde_json::Value,
        updated_secs: i64,
    ) -> ResourceRecord {
        ResourceRecord {
            id: None,
            user_id: "user-1".to_string(),
            step_id,
            substep_title: substep_title.map(|s| s.to_string()),
            resource_type: resource_type.to_string(),
            content,
            created_at: None,
            updated_at: Utc.timestamp_opt(updated_secs, 0).unwrap(),
        }
    }

    #[test]
    fn zero_records_is_all_zero() {
        let aggregate = aggregate_records(&[]);
        assert_eq!(aggregate.total_inputs, 0);
        assert_eq!(aggregate.filled_inputs, 0);
        assert_eq!(aggregate.progress_percentage, 0);
        assert!(aggregate.details_by_step.is_empty());
    }

    #[test]
    fn two_step_scenario() {
        let records = vec![
            record(1, None, "form", json!({ "goal": "x", "notes": "" }), 100),
            record(2, None, "form", json!({ "rows": [ { "a": "1", "b": "" } ] }), 100),
        ];
        let aggregate = aggregate_records(&records);
        assert_eq!(aggregate.total_inputs, 4);
        assert_eq!(aggregate.filled_inputs, 2);
        assert_eq!(aggregate.progress_percentage, 50);

        let step1 = aggregate.details_by_step.get(&1).unwrap();
        assert_eq!((step1.total_inputs, step1.filled_inputs), (2, 1));
        assert_eq!(step1.progress_percentage, 50);
        let step2 = aggregate.details_by_step.get(&2).unwrap();
        assert_eq!((step2.total_inputs, step2.filled_inputs), (2, 1));
        assert_eq!(step2.progress_percentage, 50);
    }

    #[test]
    fn latest_duplicate_wins() {
        let records = vec![
            record(1, Some("Recherche utilisateur"), "form", json!({ "a": "", "b": "" }), 100),
            record(1, Some("Recherche utilisateur"), "form", json!({ "a": "x", "b": "y" }), 200),
        ];
        let aggregate = aggregate_records(&records);
        // Only the newer record counts.
        assert_eq!(aggregate.total_inputs, 2);
        assert_eq!(aggregate.filled_inputs, 2);
        assert_eq!(aggregate.progress_percentage, 100);
    }

    #[test]
    fn malformed_content_contributes_zero() {
        let records = vec![
            record(1, None, "form", json!(null), 100),
            record(1, None, "notes", json!("just a string"), 100),
            record(3, None, "form", json!({ "a": "x" }), 100),
        ];
        let aggregate = aggregate_records(&records);
        assert_eq!(aggregate.total_inputs, 1);
        assert_eq!(aggregate.filled_inputs, 1);
        assert_eq!(aggregate.progress_percentage, 100);
    }

    #[test]
    fn percentage_is_always_in_bounds() {
        let records = vec![
            record(1, None, "a", json!({ "x": "", "y": "", "z": "f" }), 10),
            record(2, None, "b", json!({ "x": "f" }), 10),
            record(4, Some("Plan de test"), "c", json!({ "rows": [ { "a": 1 } ] }), 10),
        ];
        let aggregate = aggregate_records(&records);
        assert!(aggregate.progress_percentage <= 100);
        for step in aggregate.details_by_step.values() {
            assert!(step.progress_percentage <= 100);
            assert!(step.filled_inputs <= step.total_inputs);
        }
    }
}

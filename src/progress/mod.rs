pub mod aggregate;
pub mod counter;
pub mod tracker;

pub use aggregate::aggregate_records;
pub use counter::{count_inputs, InputCount};
pub use tracker::{ProgressSnapshot, ProgressTracker};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts and completion percentage for one journey step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub total_inputs: u64,
    pub filled_inputs: u64,
    pub progress_percentage: u8,
}

/// A user's full progress picture: global counts plus a per-step breakdown.
///
/// Always produced by a full recompute over the user's resource records,
/// never patched incrementally, so it cannot drift from source data.
/// Field names are the wire contract consumed by the web UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressAggregate {
    pub total_inputs: u64,
    pub filled_inputs: u64,
    pub progress_percentage: u8,
    pub details_by_step: BTreeMap<u32, StepProgress>,
}

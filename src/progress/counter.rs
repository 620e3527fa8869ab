//! Leaf-field counting over form content blobs.
//!
//! Form content is produced by many independently evolving form components
//! with heterogeneous shapes: flat objects, nested objects, arrays of
//! row-objects from table editors. The counter treats all of them uniformly
//! instead of special-casing per form type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputCount {
    pub total_inputs: u64,
    pub filled_inputs: u64,
}

impl InputCount {
    fn tally(&mut self, value: &Value) {
        self.total_inputs += 1;
        if is_filled(value) {
            self.filled_inputs += 1;
        }
    }
}

/// A value counts as filled unless it is `null`, `false`, `0`, or `""`.
///
/// Arrays and objects appearing as counted leaves (inside flattened array
/// rows) are always filled, matching the truthiness the stored content was
/// written against. Numeric `0` and `false` are deliberately not filled;
/// whether that is business logic or an accident is unresolved upstream,
/// so the behavior is kept as-is (see DESIGN.md).
fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Count total and filled leaf fields of an arbitrary content value.
///
/// Keys starting with `_` carry internal metadata (offline queue state,
/// error markers) and are skipped entirely, as is the `id` key. Nested
/// objects recurse to arbitrary depth. Array elements are flattened exactly
/// one level: an object element contributes one count per field, a scalar
/// element counts directly. Do not deepen the array policy; stored
/// percentages for existing table-editor content depend on it.
///
/// Total function: any non-object input yields `{0, 0}`.
pub fn count_inputs(content: &Value) -> InputCount {
    let mut count = InputCount::default();
    let Value::Object(fields) = content else {
        return count;
    };

    for (key, value) in fields {
        if key.starts_with('_') || key == "id" {
            continue;
        }
        match value {
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Object(row) => {
                            for (_column, cell) in row {
                                count.tally(cell);
                            }
                        }
                        scalar => count.tally(scalar),
                    }
                }
            }
            Value::Object(_) => {
                let nested = count_inputs(value);
                count.total_inputs += nested.total_inputs;
                count.filled_inputs += nested.filled_inputs;
            }
            scalar => count.tally(scalar),
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_objects_count_zero() {
        assert_eq!(count_inputs(&json!({})), InputCount::default());
        assert_eq!(count_inputs(&json!(null)), InputCount::default());
        assert_eq!(count_inputs(&json!("text")), InputCount::default());
        assert_eq!(count_inputs(&json!([1, 2, 3])), InputCount::default());
    }

    #[test]
    fn metadata_keys_are_skipped() {
        let count = count_inputs(&json!({ "_internal": "x", "id": "y", "name": "z" }));
        assert_eq!(count.total_inputs, 1);
        assert_eq!(count.filled_inputs, 1);
    }

    #[test]
    fn flat_object_filled_predicate() {
        let count = count_inputs(&json!({ "a": "", "b": "filled", "c": false, "d": 0 }));
        assert_eq!(count.total_inputs, 4);
        assert_eq!(count.filled_inputs, 1);
    }

    #[test]
    fn array_of_objects_flattens_one_level() {
        let count = count_inputs(&json!({
            "rows": [ { "x": "a", "y": "" }, { "x": "", "y": "" } ]
        }));
        assert_eq!(count.total_inputs, 4);
        assert_eq!(count.filled_inputs, 1);
    }

    #[test]
    fn array_of_scalars_counts_directly() {
        let count = count_inputs(&json!({ "tags": ["a", "", "c"] }));
        assert_eq!(count.total_inputs, 3);
        assert_eq!(count.filled_inputs, 2);
    }

    #[test]
    fn nested_objects_recurse_fully() {
        let count = count_inputs(&json!({
            "section": {
                "inner": { "a": "x", "b": "" },
                "c": true
            },
            "top": "y"
        }));
        assert_eq!(count.total_inputs, 4);
        assert_eq!(count.filled_inputs, 3);
    }

    #[test]
    fn filled_never_exceeds_total() {
        let samples = [
            json!({ "a": 1, "b": [ { "c": null }, "d" ], "e": { "f": 0.0 } }),
            json!({ "only_empty": "" }),
            json!({ "_meta": { "huge": "ignored" } }),
        ];
        for content in &samples {
            let count = count_inputs(content);
            assert!(count.filled_inputs <= count.total_inputs);
        }
    }

    #[test]
    fn zero_and_false_are_not_filled() {
        let count = count_inputs(&json!({ "pct": 0, "done": false, "note": "0" }));
        assert_eq!(count.total_inputs, 3);
        // The string "0" is filled; the number 0 and false are not.
        assert_eq!(count.filled_inputs, 1);
    }
}

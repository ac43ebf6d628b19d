//! Whole-payload schema for POST /api/import-metrics
//!
//! The schema checks shape only: `rows` is an array of objects whose known
//! fields carry the right JSON types, `options` flags are booleans. It does
//! NOT mark row fields as required; missing fields are a per-row outcome
//! recorded in the report, not a reason to reject the batch.

use jsonschema::{Draft, Validator};
use prism_common::{Error, Result};
use serde_json::{json, Value};

/// Compiled import request schema
pub struct ImportSchema {
    validator: Validator,
    document: Value,
}

impl ImportSchema {
    /// Compile the schema for batches of at most `max_rows` rows
    pub fn new(max_rows: usize) -> Result<Self> {
        let document = schema_document(max_rows);
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&document)
            .map_err(|e| Error::Config(format!("invalid import schema: {}", e)))?;
        Ok(Self {
            validator,
            document,
        })
    }

    /// All schema violations in `body`; empty when valid
    pub fn violations(&self, body: &Value) -> Vec<String> {
        self.validator
            .iter_errors(body)
            .map(|err| err.to_string())
            .collect()
    }

    /// The JSON Schema document itself
    pub fn document(&self) -> &Value {
        &self.document
    }
}

fn schema_document(max_rows: usize) -> Value {
    let optional_text = json!({ "type": ["string", "null"] });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "ImportMetricsRequest",
        "type": "object",
        "required": ["rows"],
        "properties": {
            "rows": {
                "type": "array",
                "maxItems": max_rows,
                "items": {
                    "type": "object",
                    "properties": {
                        "store_id": optional_text,
                        "metric_name": optional_text,
                        "metric_value": { "type": ["number", "string", "null"] },
                        "period_type": optional_text,
                        "observed_period": optional_text,
                        "submission_time_utc": optional_text
                    }
                }
            },
            "options": {
                "type": "object",
                "properties": {
                    "dryRun": { "type": "boolean" },
                    "force": { "type": "boolean" }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ImportSchema {
        ImportSchema::new(3).unwrap()
    }

    #[test]
    fn test_minimal_body_is_valid() {
        assert!(schema().violations(&json!({ "rows": [] })).is_empty());
    }

    #[test]
    fn test_rows_with_missing_fields_pass_schema() {
        let body = json!({
            "rows": [
                { "store_id": "S1", "metric_name": "score", "observed_period": "2025-07" },
                { "metric_value": "82.5", "extra_column": 7 }
            ],
            "options": { "dryRun": true, "source": "google_sheets_auto_sync" }
        });
        assert!(schema().violations(&body).is_empty());
    }

    #[test]
    fn test_missing_rows_rejected() {
        let violations = schema().violations(&json!({ "options": { "dryRun": true } }));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("rows"));
    }

    #[test]
    fn test_wrong_types_rejected() {
        assert!(!schema().violations(&json!({ "rows": {} })).is_empty());
        assert!(!schema().violations(&json!({ "rows": [42] })).is_empty());
        assert!(!schema()
            .violations(&json!({ "rows": [{ "store_id": 17 }] }))
            .is_empty());
        assert!(!schema()
            .violations(&json!({ "rows": [], "options": { "dryRun": "yes" } }))
            .is_empty());
        assert!(!schema().violations(&json!([])).is_empty());
    }

    #[test]
    fn test_all_violations_reported() {
        let body = json!({
            "rows": [{ "store_id": 1, "metric_name": 2 }],
            "options": { "force": 1 }
        });
        assert_eq!(schema().violations(&body).len(), 3);
    }

    #[test]
    fn test_batch_size_limit() {
        let rows: Vec<Value> = (0..4).map(|_| json!({})).collect();
        assert!(!schema().violations(&json!({ "rows": rows })).is_empty());
    }
}

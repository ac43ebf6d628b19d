//! Import request and report types
//!
//! Wire names follow the dashboard's JSON: options are camelCase
//! (`dryRun`), everything else snake_case.

use prism_common::MetricRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// POST /api/import-metrics request body
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    /// Candidate rows, kept as raw JSON so malformed rows can be reported
    /// back verbatim
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub options: ImportOptions,
}

/// Per-call import options
///
/// Unknown keys (e.g. `source` from the sheet sync script) are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Classify only; never mutate the store
    #[serde(default)]
    pub dry_run: bool,
    /// Incoming rows overwrite existing rows with the same key
    #[serde(default)]
    pub force: bool,
}

/// Row admitted under a key the store did not have
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceptedRow {
    pub key: String,
    pub row: MetricRow,
}

/// How a key collision was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    /// Existing row kept; incoming row recorded for audit only
    SheetWins,
    /// Incoming row replaced the existing row (`force`)
    Overwritten,
}

/// Incoming row whose key already exists in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRow {
    pub key: String,
    pub action: ConflictAction,
    pub sheet_row: MetricRow,
    pub incoming_row: MetricRow,
}

/// Why a row was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorReason {
    MissingRequiredFields,
    InvalidMetricValue,
    InvalidObservedPeriod,
    InvalidSubmissionTime,
}

/// Row skipped by per-row validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// Position in the request's `rows` array
    pub idx: usize,
    pub reason: RowErrorReason,
    /// Offending field names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<&'static str>,
    /// The row exactly as received
    pub row: Value,
}

/// Itemised classification of one import call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub total_received: usize,
    pub accepted: Vec<AcceptedRow>,
    pub conflicts: Vec<ConflictRow>,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    pub fn new(total_received: usize) -> Self {
        Self {
            total_received,
            ..Default::default()
        }
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            total_received: self.total_received,
            accepted_count: self.accepted.len(),
            conflicts_count: self.conflicts.len(),
            errors_count: self.errors.len(),
        }
    }
}

/// Counts derived from an [`ImportReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total_received: usize,
    pub accepted_count: usize,
    pub conflicts_count: usize,
    pub errors_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_default_to_commit_without_force() {
        let request: ImportRequest = serde_json::from_value(json!({ "rows": [] })).unwrap();
        assert_eq!(request.options, ImportOptions::default());
        assert!(!request.options.dry_run);
        assert!(!request.options.force);
    }

    #[test]
    fn test_options_are_camel_case_and_tolerate_extra_keys() {
        let options: ImportOptions = serde_json::from_value(json!({
            "dryRun": true,
            "force": true,
            "source": "google_sheets_auto_sync"
        }))
        .unwrap();
        assert!(options.dry_run);
        assert!(options.force);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(json!(ConflictAction::SheetWins), json!("sheet_wins"));
        assert_eq!(json!(ConflictAction::Overwritten), json!("overwritten"));
        assert_eq!(
            json!(RowErrorReason::MissingRequiredFields),
            json!("missing_required_fields")
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut report = ImportReport::new(3);
        report.errors.push(RowError {
            idx: 1,
            reason: RowErrorReason::MissingRequiredFields,
            fields: vec!["metric_value"],
            row: json!({}),
        });
        let summary = report.summary();
        assert_eq!(summary.total_received, 3);
        assert_eq!(summary.accepted_count, 0);
        assert_eq!(summary.conflicts_count, 0);
        assert_eq!(summary.errors_count, 1);
    }
}

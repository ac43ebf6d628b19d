//! Metrics reconciliation engine
//!
//! Pure merge of a batch of candidate rows into a snapshot. No I/O: the
//! caller loads the snapshot, calls [`reconcile`], and persists
//! [`Reconciliation::rows`] if it decides to commit.
//!
//! # Algorithm
//! 1. Index the snapshot by [`MetricKey`]
//! 2. For each incoming row, in input order:
//!    - invalid row: record in `errors`, leave snapshot and index untouched
//!    - unknown key: `accepted`; unless dry run, append and index at once so a
//!      later duplicate in the same batch takes the conflict path
//!    - known key, `force`: conflict `overwritten`; unless dry run, replace
//!    - known key, no `force`: conflict `sheet_wins`; never mutates
//!
//! Both mutation gates are exactly `!dry_run`.
//!
//! A forced overwrite is reported under `conflicts` only, so every received
//! row lands in exactly one bucket. Earlier versions of the import endpoint
//! also listed committed overwrites under `accepted`; clients that added the
//! two counts saw those rows twice.
//!
//! A snapshot that already holds several rows for one key (hand edits of the
//! sheet) is collapsed to the last of them before the batch is applied.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use prism_common::period::is_canonical_period;
use prism_common::models::coerce_metric_value;
use prism_common::{MetricKey, MetricRow};
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::{
    AcceptedRow, ConflictAction, ConflictRow, ImportOptions, ImportReport, RowError,
    RowErrorReason,
};

/// Result of reconciling one batch
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub report: ImportReport,
    /// Snapshot rows after the merge; for a dry run, the loaded snapshot
    /// with duplicate keys collapsed
    pub rows: Vec<MetricRow>,
}

/// Merge `incoming` into `snapshot` according to `options`
pub fn reconcile(
    snapshot: Vec<MetricRow>,
    incoming: &[Value],
    options: ImportOptions,
) -> Reconciliation {
    let mut ledger = Ledger::new(snapshot);
    let mut report = ImportReport::new(incoming.len());

    for (idx, value) in incoming.iter().enumerate() {
        let row = match parse_row(value) {
            Ok(row) => row,
            Err(rejection) => {
                report.errors.push(RowError {
                    idx,
                    reason: rejection.reason,
                    fields: rejection.fields,
                    row: value.clone(),
                });
                continue;
            }
        };

        let key = row.key();
        match ledger.get(&key).cloned() {
            None => {
                report.accepted.push(AcceptedRow {
                    key: key.to_string(),
                    row: row.clone(),
                });
                if !options.dry_run {
                    ledger.insert(key, row);
                }
            }
            Some(existing) if options.force => {
                report.conflicts.push(ConflictRow {
                    key: key.to_string(),
                    action: ConflictAction::Overwritten,
                    sheet_row: existing,
                    incoming_row: row.clone(),
                });
                if !options.dry_run {
                    ledger.replace(&key, row);
                }
            }
            Some(existing) => {
                report.conflicts.push(ConflictRow {
                    key: key.to_string(),
                    action: ConflictAction::SheetWins,
                    sheet_row: existing,
                    incoming_row: row,
                });
            }
        }
    }

    Reconciliation {
        report,
        rows: ledger.rows,
    }
}

/// Snapshot rows plus a key index kept in step with them
struct Ledger {
    rows: Vec<MetricRow>,
    index: HashMap<MetricKey, usize>,
}

impl Ledger {
    fn new(snapshot: Vec<MetricRow>) -> Self {
        let mut rows: Vec<MetricRow> = Vec::with_capacity(snapshot.len());
        let mut index = HashMap::with_capacity(snapshot.len());
        let mut collapsed = 0usize;

        for row in snapshot {
            match index.entry(row.key()) {
                // Last occurrence wins, at the position of the first
                Entry::Occupied(entry) => {
                    rows[*entry.get()] = row;
                    collapsed += 1;
                }
                Entry::Vacant(entry) => {
                    entry.insert(rows.len());
                    rows.push(row);
                }
            }
        }

        if collapsed > 0 {
            warn!(collapsed, "Snapshot held duplicate keys; kept the last row for each");
        }

        Self { rows, index }
    }

    fn get(&self, key: &MetricKey) -> Option<&MetricRow> {
        self.index.get(key).map(|&pos| &self.rows[pos])
    }

    fn insert(&mut self, key: MetricKey, row: MetricRow) {
        self.index.insert(key, self.rows.len());
        self.rows.push(row);
    }

    fn replace(&mut self, key: &MetricKey, row: MetricRow) {
        if let Some(&pos) = self.index.get(key) {
            self.rows[pos] = row;
        }
    }
}

/// Why [`parse_row`] refused a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    pub reason: RowErrorReason,
    pub fields: Vec<&'static str>,
}

impl RowRejection {
    fn new(reason: RowErrorReason, fields: Vec<&'static str>) -> Self {
        Self { reason, fields }
    }
}

const REQUIRED_TEXT_FIELDS: [&str; 3] = ["store_id", "metric_name", "observed_period"];

/// Validate one raw row and convert it to a [`MetricRow`].
///
/// Required: non-blank `store_id`, `metric_name`, `observed_period` and a
/// non-null `metric_value`. Numeric strings in `metric_value` are coerced.
pub fn parse_row(value: &Value) -> Result<MetricRow, RowRejection> {
    let Some(obj) = value.as_object() else {
        let mut fields = REQUIRED_TEXT_FIELDS.to_vec();
        fields.insert(2, "metric_value");
        return Err(RowRejection::new(
            RowErrorReason::MissingRequiredFields,
            fields,
        ));
    };

    let store_id = text_field(obj, "store_id");
    let metric_name = text_field(obj, "metric_name");
    let observed_period = text_field(obj, "observed_period");
    let raw_value = obj.get("metric_value").filter(|v| !is_blank(v));

    let mut missing = Vec::new();
    if store_id.is_none() {
        missing.push("store_id");
    }
    if metric_name.is_none() {
        missing.push("metric_name");
    }
    if raw_value.is_none() {
        missing.push("metric_value");
    }
    if observed_period.is_none() {
        missing.push("observed_period");
    }

    let (Some(store_id), Some(metric_name), Some(raw_value), Some(observed_period)) =
        (store_id, metric_name, raw_value, observed_period)
    else {
        return Err(RowRejection::new(
            RowErrorReason::MissingRequiredFields,
            missing,
        ));
    };

    let metric_value = coerce_metric_value(raw_value).ok_or_else(|| {
        RowRejection::new(RowErrorReason::InvalidMetricValue, vec!["metric_value"])
    })?;

    if !is_canonical_period(observed_period) {
        return Err(RowRejection::new(
            RowErrorReason::InvalidObservedPeriod,
            vec!["observed_period"],
        ));
    }

    let submission_time_utc = match text_field(obj, "submission_time_utc") {
        Some(text) => Some(
            DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| {
                    RowRejection::new(
                        RowErrorReason::InvalidSubmissionTime,
                        vec!["submission_time_utc"],
                    )
                })?,
        ),
        None => None,
    };

    Ok(MetricRow {
        store_id: store_id.to_string(),
        metric_name: metric_name.to_string(),
        metric_value,
        period_type: text_field(obj, "period_type").map(str::to_string),
        observed_period: observed_period.to_string(),
        submission_time_utc,
    })
}

/// Non-blank string field
fn text_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    obj.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

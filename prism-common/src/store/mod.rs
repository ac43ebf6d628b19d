//! Snapshot store collaborator
//!
//! The authoritative store (a Google Sheet in production, a JSON file locally)
//! is treated as a versioned table of [`MetricRow`]s that is read and written
//! as a whole. Every write names the version it was computed from; a store
//! whose content has moved on refuses the write with
//! [`Error::StaleSnapshot`](crate::Error::StaleSnapshot).

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::models::coerce_metric_value;
use crate::{MetricRow, Result};

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Opaque content version of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotVersion(String);

impl SnapshotVersion {
    /// Version of a store that has never been written
    pub fn empty() -> Self {
        Self("empty".to_string())
    }

    /// SHA-256 (hex) of the persisted bytes
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rows currently held by the store, with the version they were read at
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub rows: Vec<MetricRow>,
    pub version: SnapshotVersion,
    /// Stored entries that could not be read as rows. Writing `rows` back
    /// would lose them, so a snapshot with unreadable entries is read-only.
    pub unreadable: usize,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            version: SnapshotVersion::empty(),
            unreadable: 0,
        }
    }

    /// Snapshot of rows written by this crate (all readable)
    pub(crate) fn of_rows(rows: Vec<MetricRow>, version: SnapshotVersion) -> Self {
        Self {
            rows,
            version,
            unreadable: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unreadable == 0
    }
}

/// Whole-snapshot read/write access to the authoritative store
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool.
pub trait SnapshotStore: Send + Sync {
    /// Load the full snapshot.
    ///
    /// An absent store reads as an empty snapshot. Stored content that cannot
    /// be read as rows is reported in [`Snapshot::unreadable`], never dropped
    /// silently. Other I/O failures are returned.
    fn read(&self) -> Result<Snapshot>;

    /// Replace the full snapshot with `rows`.
    ///
    /// Fails with [`Error::StaleSnapshot`](crate::Error::StaleSnapshot)
    /// without writing if the store is no longer at `expected`. Returns the
    /// new version on success.
    fn write(&self, rows: &[MetricRow], expected: &SnapshotVersion) -> Result<SnapshotVersion>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Serialized form shared by all backends (pretty JSON array)
pub(crate) fn encode_rows(rows: &[MetricRow]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(rows)?)
}

/// Decode stored bytes into a snapshot versioned by those bytes.
///
/// Blank content is an empty store. Rows that fail strict decoding get a
/// second, lenient pass (numeric strings, sheet-style timestamps). Whatever
/// still cannot be read, including content that is not a JSON array at all,
/// is counted in [`Snapshot::unreadable`].
pub(crate) fn decode_snapshot(bytes: &[u8], origin: &str) -> Snapshot {
    let version = SnapshotVersion::of_bytes(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Snapshot::of_rows(Vec::new(), version);
    }

    let values = match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(values)) => values,
        Ok(_) => {
            tracing::warn!(store = %origin, "Snapshot is not a JSON array; serving it as empty and read-only");
            return Snapshot {
                rows: Vec::new(),
                version,
                unreadable: 1,
            };
        }
        Err(e) => {
            tracing::warn!(store = %origin, error = %e, "Snapshot is not valid JSON; serving it as empty and read-only");
            return Snapshot {
                rows: Vec::new(),
                version,
                unreadable: 1,
            };
        }
    };

    let total = values.len();
    let rows: Vec<MetricRow> = values.iter().filter_map(decode_stored_row).collect();
    let unreadable = total - rows.len();

    if unreadable > 0 {
        tracing::warn!(
            store = %origin,
            unreadable,
            "Snapshot has unreadable rows; commits are refused until they are fixed"
        );
    }

    Snapshot {
        rows,
        version,
        unreadable,
    }
}

fn decode_stored_row(value: &Value) -> Option<MetricRow> {
    if let Ok(row) = serde_json::from_value::<MetricRow>(value.clone()) {
        return Some(row);
    }

    let obj = value.as_object()?;
    let submission_time_utc = match obj.get("submission_time_utc") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(parse_stored_time(s)?),
        Some(_) => return None,
    };

    Some(MetricRow {
        store_id: stored_text(obj, "store_id")?.to_string(),
        metric_name: stored_text(obj, "metric_name")?.to_string(),
        metric_value: coerce_metric_value(obj.get("metric_value")?)?,
        period_type: stored_text(obj, "period_type").map(str::to_string),
        observed_period: stored_text(obj, "observed_period")?.to_string(),
        submission_time_utc,
    })
}

fn stored_text<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    obj.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// RFC 3339, or a zone-less `YYYY-MM-DD HH:MM:SS` taken as UTC
fn parse_stored_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_content_digest() {
        let a = SnapshotVersion::of_bytes(b"[]");
        let b = SnapshotVersion::of_bytes(b"[]");
        let c = SnapshotVersion::of_bytes(b"[ ]");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, SnapshotVersion::empty());
    }

    #[test]
    fn test_decode_blank_and_non_array() {
        let blanks: [&[u8]; 2] = [b"", b"  \n"];
        for blank in blanks {
            let snapshot = decode_snapshot(blank, "test");
            assert!(snapshot.rows.is_empty());
            assert!(snapshot.is_complete());
        }
        let garbage: [&[u8]; 2] = [br#"{"rows": []}"#, b"not json"];
        for garbage in garbage {
            let snapshot = decode_snapshot(garbage, "test");
            assert!(snapshot.rows.is_empty());
            assert_eq!(snapshot.unreadable, 1);
        }
    }

    #[test]
    fn test_decode_counts_unreadable_rows() {
        let bytes = br#"[
            {"store_id": "S1", "metric_name": "score", "metric_value": 80, "observed_period": "2025-06"},
            {"store_id": "S2"},
            {"store_id": "S3", "metric_name": "score", "metric_value": 91.5, "observed_period": "2025-06"}
        ]"#;
        let snapshot = decode_snapshot(bytes, "test");
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.rows[0].store_id, "S1");
        assert_eq!(snapshot.rows[1].store_id, "S3");
        assert_eq!(snapshot.unreadable, 1);
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn test_decode_legacy_sheet_rows() {
        let bytes = br#"[
            {"store_id": "S9", "metric_name": "score", "metric_value": "77", "observed_period": "2025-06"},
            {"store_id": "S8", "metric_name": "score", "metric_value": 70, "observed_period": "2025-06",
             "submission_time_utc": "2025-07-01 10:00:00"}
        ]"#;
        let snapshot = decode_snapshot(bytes, "test");

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.rows[0].metric_value, serde_json::Number::from(77));
        assert_eq!(
            snapshot.rows[1].submission_time_utc.map(|t| t.to_rfc3339()),
            Some("2025-07-01T10:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_unparsable_timestamp_is_unreadable() {
        let bytes = br#"[{"store_id": "S8", "metric_name": "score", "metric_value": 70,
                          "observed_period": "2025-06", "submission_time_utc": "yesterday"}]"#;
        assert_eq!(decode_snapshot(bytes, "test").unreadable, 1);
    }
}

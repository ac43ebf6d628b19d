//! In-memory snapshot store for tests and embedding

use std::sync::{Mutex, MutexGuard};

use super::{encode_rows, Snapshot, SnapshotStore, SnapshotVersion};
use crate::{Error, MetricRow, Result};

#[derive(Debug)]
struct Inner {
    snapshot: Snapshot,
    fail_writes: bool,
    writes: usize,
}

/// Snapshot store held entirely in memory
///
/// Versions are derived from the encoded rows exactly like the file store, so
/// writing identical content yields an identical version.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                snapshot: Snapshot::empty(),
                fail_writes: false,
                writes: 0,
            }),
        }
    }

    /// Store pre-populated with `rows`
    pub fn with_rows(rows: Vec<MetricRow>) -> Result<Self> {
        let store = Self::new();
        store.replace(rows)?;
        Ok(store)
    }

    /// Make every subsequent write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Overwrite content out-of-band, as another writer would
    pub fn replace(&self, rows: Vec<MetricRow>) -> Result<SnapshotVersion> {
        let version = SnapshotVersion::of_bytes(&encode_rows(&rows)?);
        self.lock().snapshot = Snapshot::of_rows(rows, version.clone());
        Ok(version)
    }

    /// Number of successful writes through [`SnapshotStore::write`]
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self) -> Result<Snapshot> {
        Ok(self.lock().snapshot.clone())
    }

    fn write(&self, rows: &[MetricRow], expected: &SnapshotVersion) -> Result<SnapshotVersion> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store configured to fail writes",
            )));
        }
        if &inner.snapshot.version != expected {
            return Err(Error::StaleSnapshot {
                expected: expected.to_string(),
                found: inner.snapshot.version.to_string(),
            });
        }

        let version = SnapshotVersion::of_bytes(&encode_rows(rows)?);
        inner.snapshot = Snapshot::of_rows(rows.to_vec(), version.clone());
        inner.writes += 1;
        Ok(version)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

//! JSON file snapshot store
//!
//! Local stand-in for the Google Sheet: a pretty-printed JSON array of rows.
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so readers see either the old or the new snapshot.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{decode_snapshot, encode_rows, Snapshot, SnapshotStore, SnapshotVersion};
use crate::{Error, MetricRow, Result};

/// Snapshot store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw bytes, or `None` if the file does not exist
    fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn read(&self) -> Result<Snapshot> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(Snapshot::empty());
        };

        Ok(decode_snapshot(&bytes, &self.describe()))
    }

    fn write(&self, rows: &[MetricRow], expected: &SnapshotVersion) -> Result<SnapshotVersion> {
        let current = match self.read_bytes()? {
            Some(bytes) => SnapshotVersion::of_bytes(&bytes),
            None => SnapshotVersion::empty(),
        };
        if &current != expected {
            return Err(Error::StaleSnapshot {
                expected: expected.to_string(),
                found: current.to_string(),
            });
        }

        let bytes = encode_rows(rows)?;
        let dir = self.parent_dir();
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            rows = rows.len(),
            "Snapshot written"
        );

        Ok(SnapshotVersion::of_bytes(&bytes))
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

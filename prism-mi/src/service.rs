//! Import service: load, reconcile, persist
//!
//! Commits are serialised by an in-process lock, and each write carries the
//! snapshot version it was computed from, so a concurrent out-of-process
//! writer is detected (`stale_snapshot`) instead of silently overwritten.
//!
//! The deadline is checked inside the job, right before the write. A timeout
//! is therefore reported if and only if nothing was written.
//!
//! Every non-dry-run call writes, even when the batch changed nothing, so a
//! broken store always surfaces as `persist_failed`. A snapshot with stored
//! entries that could not be read is never written back: the commit is
//! refused with `read_failed` instead of dropping those entries.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use prism_common::{Error, SnapshotStore, SnapshotVersion};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{ImportOptions, ImportReport};
use crate::reconcile::reconcile;

/// Outcome of one successful import call
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub import_id: Uuid,
    pub report: ImportReport,
    pub dry_run: bool,
    /// New store version if this call wrote the store
    pub committed: Option<SnapshotVersion>,
}

/// Runs imports against one snapshot store
pub struct ImportService {
    store: Arc<dyn SnapshotStore>,
    commit_lock: Mutex<()>,
    timeout: Duration,
}

impl ImportService {
    pub fn new(store: Arc<dyn SnapshotStore>, timeout: Duration) -> Self {
        Self {
            store,
            commit_lock: Mutex::new(()),
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Import `rows` with `options`.
    ///
    /// Blocking: call from the blocking pool. The schema gate has already run.
    pub fn import(&self, rows: &[Value], options: ImportOptions) -> ApiResult<ImportOutcome> {
        let deadline = Instant::now() + self.timeout;
        let import_id = Uuid::new_v4();

        info!(
            import_id = %import_id,
            rows = rows.len(),
            dry_run = options.dry_run,
            force = options.force,
            "Import started"
        );

        // Dry runs only read; a single load is already consistent
        let _guard = if options.dry_run {
            None
        } else {
            Some(
                self.commit_lock
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            )
        };

        let snapshot = self.store.read().map_err(|e| {
            warn!(import_id = %import_id, error = %e, "Snapshot read failed");
            ApiError::ReadFailed(e.to_string())
        })?;
        if !options.dry_run && !snapshot.is_complete() {
            warn!(
                import_id = %import_id,
                store = %self.store.describe(),
                unreadable = snapshot.unreadable,
                "Refusing to commit over unreadable snapshot content"
            );
            return Err(ApiError::ReadFailed(format!(
                "{} stored entries could not be read; fix them before importing",
                snapshot.unreadable
            )));
        }
        let version = snapshot.version.clone();

        let result = reconcile(snapshot.rows, rows, options);
        let summary = result.report.summary();

        self.check_deadline(deadline, import_id)?;

        let committed = if options.dry_run {
            debug!(import_id = %import_id, "Dry run; nothing written");
            None
        } else {
            match self.store.write(&result.rows, &version) {
                Ok(new_version) => Some(new_version),
                Err(Error::StaleSnapshot { expected, found }) => {
                    warn!(
                        import_id = %import_id,
                        expected = %expected,
                        found = %found,
                        "Snapshot changed during import; nothing written"
                    );
                    return Err(ApiError::StaleSnapshot(format!(
                        "expected version {}, store is at {}",
                        expected, found
                    )));
                }
                Err(e) => {
                    tracing::error!(
                        import_id = %import_id,
                        store = %self.store.describe(),
                        error = %e,
                        "Snapshot persist failed"
                    );
                    return Err(ApiError::PersistFailed(e.to_string()));
                }
            }
        };

        info!(
            import_id = %import_id,
            accepted = summary.accepted_count,
            conflicts = summary.conflicts_count,
            errors = summary.errors_count,
            dry_run = options.dry_run,
            committed = committed.is_some(),
            "Import finished"
        );

        Ok(ImportOutcome {
            import_id,
            report: result.report,
            dry_run: options.dry_run,
            committed,
        })
    }

    fn check_deadline(&self, deadline: Instant, import_id: Uuid) -> ApiResult<()> {
        if Instant::now() >= deadline {
            let limit = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(import_id = %import_id, timeout_ms = limit, "Import deadline exceeded; nothing written");
            return Err(ApiError::ImportTimeout(limit));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConflictAction;
    use prism_common::store::MemoryStore;
    use serde_json::json;

    fn service(store: Arc<MemoryStore>) -> ImportService {
        ImportService::new(store, Duration::from_secs(30))
    }

    fn score(store: &str, value: f64) -> Value {
        json!({
            "store_id": store,
            "metric_name": "score",
            "metric_value": value,
            "period_type": "monthly",
            "observed_period": "2025-07"
        })
    }

    const COMMIT: ImportOptions = ImportOptions {
        dry_run: false,
        force: false,
    };

    #[test]
    fn test_commit_then_replay() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        let rows = [score("S1", 82.5)];

        let first = service.import(&rows, COMMIT).unwrap();
        assert_eq!(first.report.summary().accepted_count, 1);
        assert!(first.committed.is_some());
        let after_first = store.read().unwrap();
        assert_eq!(after_first.rows.len(), 1);

        let second = service.import(&rows, COMMIT).unwrap();
        let summary = second.report.summary();
        assert_eq!(summary.accepted_count, 0);
        assert_eq!(summary.conflicts_count, 1);
        assert_eq!(second.report.conflicts[0].action, ConflictAction::SheetWins);
        // Rewritten with identical content, so the version does not move
        assert_eq!(second.committed, first.committed);
        assert_eq!(store.read().unwrap(), after_first);
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let outcome = service
            .import(
                &[score("S1", 82.5)],
                ImportOptions {
                    dry_run: true,
                    force: true,
                },
            )
            .unwrap();
        assert!(outcome.dry_run);
        assert!(outcome.committed.is_none());
        assert_eq!(outcome.report.summary().accepted_count, 1);
        assert_eq!(store.write_count(), 0);
        assert!(store.read().unwrap().rows.is_empty());
    }

    #[test]
    fn test_persist_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_writes(true);
        let service = service(store.clone());

        let result = service.import(&[score("S1", 82.5)], COMMIT);
        assert!(matches!(result, Err(ApiError::PersistFailed(_))));

        // Next call reloads from the store and sees nothing committed
        store.set_fail_writes(false);
        let retry = service.import(&[score("S1", 82.5)], COMMIT).unwrap();
        assert_eq!(retry.report.summary().accepted_count, 1);
    }

    #[test]
    fn test_zero_deadline_aborts_before_write() {
        let store = Arc::new(MemoryStore::new());
        let service = ImportService::new(store.clone(), Duration::ZERO);

        let result = service.import(&[score("S1", 82.5)], COMMIT);
        assert!(matches!(result, Err(ApiError::ImportTimeout(0))));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_all_invalid_batch_leaves_rows_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let outcome = service.import(&[json!({ "store_id": "S1" })], COMMIT).unwrap();
        assert_eq!(outcome.report.summary().errors_count, 1);
        assert!(outcome.committed.is_some());
        assert!(store.read().unwrap().rows.is_empty());
    }

    #[test]
    fn test_broken_store_fails_even_without_changes() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        service.import(&[score("S1", 82.5)], COMMIT).unwrap();
        store.set_fail_writes(true);

        let result = service.import(&[score("S1", 82.5)], COMMIT);
        assert!(matches!(result, Err(ApiError::PersistFailed(_))));
    }

    #[test]
    fn test_concurrent_commits_keep_every_update() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        std::thread::scope(|scope| {
            for batch in 0..4 {
                let service = &service;
                scope.spawn(move || {
                    let rows: Vec<Value> = (0..10)
                        .map(|i| score(&format!("T{}-{}", batch, i), 1.0))
                        .collect();
                    service.import(&rows, COMMIT).unwrap();
                });
            }
        });

        assert_eq!(store.read().unwrap().rows.len(), 40);
        assert_eq!(store.write_count(), 4);
    }
}

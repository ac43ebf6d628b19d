//! Read-side snapshot cache
//!
//! Owned by [`AppState`](crate::AppState) and shared by reference; there is no
//! process-global cache. Committed imports call [`SnapshotCache::invalidate`].
//! A load that started before an invalidation is returned to its caller but
//! not cached.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use prism_common::{Snapshot, SnapshotStore};

/// One loaded snapshot
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: Arc<Snapshot>,
    pub loaded_at: DateTime<Utc>,
    fetched: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entry: Option<CachedSnapshot>,
    generation: u64,
}

/// Snapshot cache with a fixed TTL (zero disables caching)
#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached snapshot if still fresh, else a fresh load from `store`.
    ///
    /// Blocking: call from the blocking pool.
    pub fn get_or_load(&self, store: &dyn SnapshotStore) -> prism_common::Result<CachedSnapshot> {
        let generation = {
            let state = self.lock();
            if let Some(entry) = &state.entry {
                if entry.fetched.elapsed() < self.ttl {
                    return Ok(entry.clone());
                }
            }
            state.generation
        };

        let entry = CachedSnapshot {
            snapshot: Arc::new(store.read()?),
            loaded_at: Utc::now(),
            fetched: Instant::now(),
        };

        if !self.ttl.is_zero() {
            let mut state = self.lock();
            if state.generation == generation {
                state.entry = Some(entry.clone());
            }
        }

        Ok(entry)
    }

    /// Drop the cached snapshot and discard any load in flight
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.generation += 1;
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! prism-mi library - Metrics Import module
//!
//! Reconciles metric rows from the audit dashboard and the sheet sync script
//! against the authoritative snapshot store.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use prism_common::config::TomlConfig;
use prism_common::SnapshotStore;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod cache;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod schema;
pub mod service;
pub mod summary;

pub use crate::error::{ApiError, ApiResult};

use crate::cache::SnapshotCache;
use crate::schema::ImportSchema;
use crate::service::ImportService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Import pipeline over the snapshot store
    pub imports: Arc<ImportService>,
    /// Compiled request schema
    pub schema: Arc<ImportSchema>,
    /// Read-side snapshot cache
    pub cache: Arc<SnapshotCache>,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create application state over `store` using the bootstrap settings
    pub fn new(store: Arc<dyn SnapshotStore>, config: &TomlConfig) -> prism_common::Result<Self> {
        Ok(Self {
            imports: Arc::new(ImportService::new(
                store,
                Duration::from_millis(config.server.request_timeout_ms),
            )),
            schema: Arc::new(ImportSchema::new(config.import.max_rows)?),
            cache: Arc::new(SnapshotCache::new(Duration::from_secs(
                config.cache.snapshot_ttl_secs,
            ))),
            max_body_bytes: config.server.max_body_bytes,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .merge(api::import_routes())
        .merge(api::snapshot_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

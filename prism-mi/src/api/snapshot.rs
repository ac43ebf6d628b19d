//! Read-only snapshot endpoints
//!
//! GET /api/sheet-snapshot, GET /api/sheet-snapshot/summary
//! Both accept optional `store_id`, `period` and `metric` filters.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prism_common::{MetricRow, SnapshotVersion};
use serde::Serialize;

use crate::{
    cache::CachedSnapshot,
    error::{ApiError, ApiResult},
    summary::{summarize, SnapshotFilter, SnapshotSummary},
    AppState,
};

/// Snapshot response metadata
#[derive(Debug, Serialize)]
pub struct SnapshotMetadata {
    pub total_rows: usize,
    pub version: SnapshotVersion,
    pub loaded_at: DateTime<Utc>,
    /// Null when no filter was given
    pub filters_applied: Option<SnapshotFilter>,
}

/// GET /api/sheet-snapshot response
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub ok: bool,
    pub rows: Vec<MetricRow>,
    pub metadata: SnapshotMetadata,
}

/// GET /api/sheet-snapshot/summary response
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub ok: bool,
    pub summary: SnapshotSummary,
    pub metadata: SnapshotMetadata,
}

/// GET /api/sheet-snapshot
pub async fn get_snapshot(
    State(state): State<AppState>,
    Query(filter): Query<SnapshotFilter>,
) -> ApiResult<Json<SnapshotResponse>> {
    let cached = load_snapshot(&state).await?;
    let rows: Vec<MetricRow> = cached
        .snapshot
        .rows
        .iter()
        .filter(|row| filter.matches(row))
        .cloned()
        .collect();

    Ok(Json(SnapshotResponse {
        ok: true,
        metadata: metadata(&cached, rows.len(), filter),
        rows,
    }))
}

/// GET /api/sheet-snapshot/summary
pub async fn get_snapshot_summary(
    State(state): State<AppState>,
    Query(filter): Query<SnapshotFilter>,
) -> ApiResult<Json<SummaryResponse>> {
    let cached = load_snapshot(&state).await?;
    let summary = summarize(cached.snapshot.rows.iter().filter(|row| filter.matches(row)));

    Ok(Json(SummaryResponse {
        ok: true,
        metadata: metadata(&cached, summary.total_rows, filter),
        summary,
    }))
}

async fn load_snapshot(state: &AppState) -> ApiResult<CachedSnapshot> {
    let cache = state.cache.clone();
    let store = state.imports.store().clone();

    tokio::task::spawn_blocking(move || cache.get_or_load(&*store))
        .await
        .map_err(|e| ApiError::Internal(format!("snapshot task failed: {}", e)))?
        .map_err(|e| {
            tracing::warn!(error = %e, "Snapshot read failed");
            ApiError::ReadFailed(e.to_string())
        })
}

fn metadata(cached: &CachedSnapshot, total_rows: usize, filter: SnapshotFilter) -> SnapshotMetadata {
    SnapshotMetadata {
        total_rows,
        version: cached.snapshot.version.clone(),
        loaded_at: cached.loaded_at,
        filters_applied: (!filter.is_empty()).then_some(filter),
    }
}

/// Build snapshot routes
pub fn snapshot_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sheet-snapshot", get(get_snapshot))
        .route("/api/sheet-snapshot/summary", get(get_snapshot_summary))
}

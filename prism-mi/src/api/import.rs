//! Metrics import API handlers
//!
//! POST /api/import-metrics, GET /api/import-metrics/schema

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{ImportReport, ImportRequest, ImportSummary},
    AppState,
};

/// POST /api/import-metrics response
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub ok: bool,
    pub summary: ImportSummary,
    pub report: ImportReport,
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
    pub import_id: Uuid,
}

/// POST /api/import-metrics
///
/// Schema gate first (whole call rejected on failure), then per-row
/// reconciliation on the blocking pool.
pub async fn import_metrics(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ImportResponse>> {
    let Json(body) = payload.map_err(rejection_error)?;

    let violations = state.schema.violations(&body);
    if !violations.is_empty() {
        tracing::warn!(violations = violations.len(), "Import request failed schema validation");
        return Err(ApiError::ValidationFailed(violations));
    }

    let request: ImportRequest = serde_json::from_value(body)
        .map_err(|e| ApiError::ValidationFailed(vec![e.to_string()]))?;

    let service = state.imports.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        service.import(&request.rows, request.options)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("import task failed: {}", e)))??;

    if outcome.committed.is_some() {
        state.cache.invalidate();
    }

    Ok(Json(ImportResponse {
        ok: true,
        summary: outcome.report.summary(),
        report: outcome.report,
        dry_run: outcome.dry_run,
        import_id: outcome.import_id,
    }))
}

/// GET /api/import-metrics/schema
pub async fn import_schema(State(state): State<AppState>) -> Json<Value> {
    Json(state.schema.document().clone())
}

/// Unparsable bodies are schema failures; oversized bodies keep their 413
fn rejection_error(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(rejection.body_text())
    } else {
        ApiError::ValidationFailed(vec![rejection.body_text()])
    }
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import-metrics", post(import_metrics))
        .route("/api/import-metrics/schema", get(import_schema))
}

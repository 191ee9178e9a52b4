//! Pipeline trigger routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use castsense_runtime::ScoreReport;
use serde_json::json;

use super::{internal_error, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/pipeline/score", post(score_pending))
}

/// POST /api/pipeline/score: attribute comments collected since the last run.
async fn score_pending(State(state): State<Arc<AppState>>) -> Result<Json<ScoreReport>, ApiError> {
    let worker = state.clone();
    let report = tokio::task::spawn_blocking(move || worker.pipeline.score_pending())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Scoring task failed: {}", e) })),
            )
        })?
        .map_err(internal_error)?;
    Ok(Json(report))
}

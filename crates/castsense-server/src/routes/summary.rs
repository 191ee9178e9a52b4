//! Narrative summary and LLM configuration routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use castsense_summary::{summarize_comments, LLMConfigUpdate, SummaryResponse};
use serde_json::{json, Value};
use tracing::info;

use super::{internal_error, resolve_or_404, ApiError};
use crate::state::AppState;

/// Comments fetched for one summary, most recent first.
const SUMMARY_SOURCE_LIMIT: usize = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/entities/{name}/summary", post(summarize_entity))
        .route("/summary/config", get(get_config).put(update_config))
}

/// POST /api/entities/{name}/summary
async fn summarize_entity(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let entity = resolve_or_404(&state, &name)?;
    let comments = state
        .store
        .get_entity_comments(&entity, SUMMARY_SOURCE_LIMIT)
        .map_err(internal_error)?;

    // Clone so the lock is not held across the provider call.
    let config = state.llm_config.read().clone();
    info!("Summarising {} comments about {}", comments.len(), entity);
    let summary = summarize_comments(&state.http, &config, &comments).await;

    Ok(Json(SummaryResponse {
        entity,
        summary,
        comment_count: comments.len(),
    }))
}

/// GET /api/summary/config: provider settings with keys masked.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.llm_config.read();
    Json(json!(config.to_response()))
}

/// PUT /api/summary/config
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LLMConfigUpdate>,
) -> Result<Json<Value>, ApiError> {
    let mut config = state.llm_config.write();
    config.apply_update(&update);

    if let Err(e) = config.save() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to save config: {}", e) })),
        ));
    }
    Ok(Json(json!(config.to_response())))
}

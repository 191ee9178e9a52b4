//! Stats and run history routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::{internal_error, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/runs", get(get_runs))
}

/// GET /api/stats: storage statistics.
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.store.get_stats().map_err(internal_error)?;
    let pending = state.store.count_unprocessed().map_err(internal_error)?;

    Ok(Json(serde_json::json!({
        "season": state.config.season,
        "subreddit": state.config.subreddit,
        "episodePosts": stats.episode_posts,
        "comments": stats.comments,
        "processedComments": stats.processed_comments,
        "pendingComments": pending,
        "attributions": stats.attributions,
        "entities": stats.entities,
        "episodes": stats.episodes,
        "dbSizeMb": stats.db_size_mb,
        "scorer": state.pipeline.scorer_name(),
    })))
}

/// GET /api/runs: most recent pipeline runs.
async fn get_runs(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let runs = state.store.recent_runs(20).map_err(internal_error)?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}

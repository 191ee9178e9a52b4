//! Dashboard data routes: entity selector, per-entity timeline, aggregates.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use castsense_aggregate::classify;
use castsense_core::AggregateRow;
use serde_json::{json, Value};

use super::{internal_error, resolve_or_404, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/entities", get(list_entities))
        .route("/entities/{name}/timeline", get(entity_timeline))
        .route("/aggregates", get(list_aggregates))
}

fn aggregate_json(row: &AggregateRow) -> Value {
    json!({
        "entity": row.entity,
        "episodeNum": row.episode_num,
        "airdate": row.airdate.to_string(),
        "meanSentiment": row.mean_sentiment,
        "commentCount": row.comment_count,
        "class": classify(row.mean_sentiment).to_string(),
    })
}

/// GET /api/entities: every attributed entity with its season-wide mean.
async fn list_entities(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let overview = state.pipeline.entity_overview().map_err(internal_error)?;
    let entities: Vec<Value> = overview
        .iter()
        .map(|o| {
            json!({
                "entity": o.entity,
                "commentCount": o.comment_count,
                "meanSentiment": o.mean_sentiment,
                "class": o.class.to_string(),
            })
        })
        .collect();
    Ok(Json(json!({ "entities": entities })))
}

/// GET /api/entities/{name}/timeline
async fn entity_timeline(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let entity = resolve_or_404(&state, &name)?;
    let rows = state
        .pipeline
        .aggregates(Some(&entity))
        .map_err(internal_error)?;
    Ok(Json(json!({
        "entity": entity,
        "timeline": rows.iter().map(aggregate_json).collect::<Vec<_>>(),
    })))
}

/// GET /api/aggregates
async fn list_aggregates(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let rows = state.pipeline.aggregates(None).map_err(internal_error)?;
    Ok(Json(json!({
        "aggregates": rows.iter().map(aggregate_json).collect::<Vec<_>>(),
    })))
}

//! HTTP route handlers for the dashboard.

pub mod dashboard;
pub mod pipeline;
pub mod stats;
pub mod summary;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

pub type ApiError = (StatusCode, Json<Value>);

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(dashboard::routes())
        .merge(summary::routes())
        .merge(stats::routes())
        .merge(pipeline::routes())
}

pub(crate) fn internal_error(e: castsense_core::Error) -> ApiError {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

/// Canonical entity name, or a 404 for names the season does not know.
pub(crate) fn resolve_or_404(state: &AppState, name: &str) -> Result<String, ApiError> {
    match state.store.resolve_entity(name).map_err(internal_error)? {
        Some(entity) => Ok(entity),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown entity: {}", name) })),
        )),
    }
}

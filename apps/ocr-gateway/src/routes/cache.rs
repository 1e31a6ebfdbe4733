//! Cache inspection routes
//!
//! - GET /cache/stats - Entry count, capacity and hit/miss counters
//! - DELETE /cache - Drop every cached result

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::cache::CacheStats;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache", delete(clear_cache))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache().stats())
}

async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    let dropped = state.cache().len();
    state.cache().clear();
    tracing::info!(dropped, "Cache cleared");
    StatusCode::NO_CONTENT
}

//! Route modules for the OCR gateway
//!
//! Every route is served under `/v1` and mirrored at the root.

pub mod cache;
pub mod extract;
pub mod health;

use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, Router};

use crate::rate_limit::rate_limit_by_ip;
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(extract::router(&state))
        .merge(cache::router())
        .merge(health::router());

    Router::new()
        .nest("/v1", api.clone())
        .merge(api)
        .layer(from_fn_with_state(
            state.rate_limits().global.clone(),
            rate_limit_by_ip,
        ))
        .layer(DefaultBodyLimit::max(state.config().body_limit()))
        .with_state(state)
}

//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use docpipe_core::FilterMode;

use crate::json::HealthResponse;
use crate::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entities: state.handler.registry().len(),
        default_limit: state.config.default_limit,
        literal_filters: state.config.filter_mode == FilterMode::Literal,
    })
}

//! Fluent collection query endpoint.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use docpipe_core::RequestParams;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::AppState;

/// Fluent query routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/fluent/:collection", get(handle_fluent))
}

/// Run the request's query string against a collection.
///
/// The envelope's status code becomes the HTTP status.
async fn handle_fluent(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    debug!(collection = %collection, params = pairs.len(), "Fluent query");

    let params: RequestParams = pairs.into_iter().collect();
    let response = state.handler.exec_collection(&collection, params).await?;
    if response.is_5xx() {
        warn!(collection = %collection, status = response.status, "Fluent query failed");
    } else if !response.is_2xx() {
        debug!(collection = %collection, status = response.status, "Fluent query rejected");
    }

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(response.body)).into_response())
}

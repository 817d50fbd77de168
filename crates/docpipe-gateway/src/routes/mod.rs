//! HTTP route handlers.

pub mod collections;
pub mod fluent;
pub mod health;

use axum::http::Uri;

use crate::error::AppError;

/// Fallback for unmatched paths.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}

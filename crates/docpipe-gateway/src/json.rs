//! JSON response types for the HTTP gateway.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Number of registered entities.
    pub entities: usize,
    /// Page size used when a request has no `limit`.
    pub default_limit: u64,
    /// Whether filter values are matched literally.
    pub literal_filters: bool,
}

/// Registered collections.
#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
    /// One entry per registered entity, in registration order.
    pub collections: Vec<CollectionInfo>,
}

/// A registered collection and what clients may do with it.
#[derive(Debug, Serialize)]
pub struct CollectionInfo {
    /// Entity name.
    pub entity: String,
    /// Collection name used in `/fluent/{collection}`.
    pub collection: String,
    /// Identity field.
    pub identity: String,
    /// Fields searchable through `filter` and field filters.
    pub filterable: Vec<String>,
    /// Aliases of joined entities.
    pub joins: Vec<String>,
}

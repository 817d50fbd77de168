//! Docpipe HTTP/JSON Gateway.
//!
//! Exposes a [`FluentHandler`] over HTTP: `GET /fluent/{collection}` takes the
//! request's query string as parameters and answers with the response envelope.

pub mod config;
pub mod demo;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, GatewayConfig};
pub use error::AppError;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use docpipe_core::{EntityDef, EntityRegistry, FilterPolicyRegistry, FluentHandler, MemoryStore};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Fluent query handler.
    pub handler: Arc<FluentHandler>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(handler: FluentHandler, config: GatewayConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            config,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::collections::routes())
        .merge(routes::fluent::routes())
        .fallback(routes::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Build a handler from the configured schema and data files, falling back to
/// the demo set for whichever is missing.
pub fn build_handler(config: &GatewayConfig) -> anyhow::Result<FluentHandler> {
    let entities = match &config.schema_path {
        Some(path) => load_entities(path)?,
        None => demo::entities(),
    };

    let registry = EntityRegistry::builder().register_all(entities)?.build();
    let policies = registry
        .entity_names()
        .iter()
        .fold(FilterPolicyRegistry::builder(), |builder, name| {
            builder.register(name.clone(), None)
        })
        .build(&registry)?;

    let store = MemoryStore::new();
    let data = match &config.data_path {
        Some(path) => read_json(path)?,
        None => demo::data(),
    };
    let loaded = store.load_json(&data)?;
    info!(
        entities = registry.len(),
        documents = loaded,
        collections = ?store.collection_names(),
        "Loaded schema and data"
    );

    Ok(FluentHandler::new(
        Arc::new(registry),
        Arc::new(policies),
        Arc::new(store),
        config.handler_config(),
    ))
}

fn load_entities(path: &Path) -> anyhow::Result<Vec<EntityDef>> {
    let value = read_json(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("invalid entity definitions in {}", path.display()))
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

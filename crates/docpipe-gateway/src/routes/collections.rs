//! Registered collection listing.

use axum::{extract::State, routing::get, Json, Router};

use crate::json::{CollectionInfo, CollectionsResponse};
use crate::AppState;

/// Collection routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/collections", get(list_collections))
}

async fn list_collections(State(state): State<AppState>) -> Json<CollectionsResponse> {
    let handler = &state.handler;
    let collections = handler
        .registry()
        .entity_names()
        .iter()
        .filter_map(|name| handler.registry().get(name))
        .map(|entity| CollectionInfo {
            entity: entity.name().to_string(),
            collection: entity.collection().to_string(),
            identity: entity.def.identity_field.clone(),
            filterable: handler.policies().fields_for(entity.name()).to_vec(),
            joins: entity.joins.iter().map(|join| join.alias.clone()).collect(),
        })
        .collect();

    Json(CollectionsResponse { collections })
}

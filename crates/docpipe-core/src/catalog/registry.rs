//! Entity registry built once at start-up.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::entity::EntityDef;
use super::reflect::{SchemaReflection, SchemaReflector};
use crate::error::Error;
use crate::query::{JoinResolver, JoinSpec, ProjectionPruner};

/// An entity definition together with everything derived from it at build time.
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    /// The entity definition.
    pub def: EntityDef,
    /// Reflected references and hidden fields.
    pub reflection: SchemaReflection,
    /// Joins derived from the resolved references.
    pub joins: Vec<JoinSpec>,
    /// Hidden paths of the entity and its joins.
    pub pruner: ProjectionPruner,
}

impl ResolvedEntity {
    /// Entity name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Collection name.
    pub fn collection(&self) -> &str {
        &self.def.collection
    }
}

/// Immutable registry of entities, keyed by name and by collection.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Arc<ResolvedEntity>>,
    collections: HashMap<String, String>,
    order: Vec<String>,
}

/// Builder for [`EntityRegistry`].
#[derive(Debug, Default)]
pub struct EntityRegistryBuilder {
    defs: Vec<EntityDef>,
}

impl EntityRegistryBuilder {
    /// Register an entity.
    ///
    /// Fails when the entity name or collection is already registered.
    pub fn register(mut self, def: EntityDef) -> Result<Self, Error> {
        if self.defs.iter().any(|d| d.name == def.name) {
            return Err(Error::Config(format!(
                "entity '{}' is already registered",
                def.name
            )));
        }
        if let Some(existing) = self.defs.iter().find(|d| d.collection == def.collection) {
            return Err(Error::Config(format!(
                "collection '{}' is already registered by entity '{}'",
                def.collection, existing.name
            )));
        }
        self.defs.push(def);
        Ok(self)
    }

    /// Register several entities.
    pub fn register_all(self, defs: impl IntoIterator<Item = EntityDef>) -> Result<Self, Error> {
        defs.into_iter().try_fold(self, |builder, def| builder.register(def))
    }

    /// Reflect every entity and derive its joins and pruning paths.
    pub fn build(self) -> EntityRegistry {
        let order: Vec<String> = self.defs.iter().map(|d| d.name.clone()).collect();
        let defs: HashMap<String, EntityDef> = self
            .defs
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        let reflector = SchemaReflector::new(&defs);
        let reflections: HashMap<&str, SchemaReflection> = defs
            .values()
            .map(|d| (d.name.as_str(), reflector.reflect(d)))
            .collect();

        let mut entities = HashMap::with_capacity(defs.len());
        let mut collections = HashMap::with_capacity(defs.len());

        for (name, def) in &defs {
            let reflection = reflections.get(name.as_str()).cloned().unwrap_or_default();
            let joins = JoinResolver::resolve(name, &reflection.references);

            let pruner = joins.iter().fold(
                ProjectionPruner::new(&reflection.hidden),
                |pruner, join| match reflections.get(join.entity.as_str()) {
                    Some(joined) => pruner.with_join(join, &joined.hidden),
                    None => pruner,
                },
            );

            debug!(
                entity = %name,
                joins = joins.len(),
                hidden = pruner.candidates().len(),
                unresolved = reflection.unresolved.len(),
                "Resolved entity"
            );

            collections.insert(def.collection.clone(), name.clone());
            entities.insert(
                name.clone(),
                Arc::new(ResolvedEntity {
                    def: def.clone(),
                    reflection,
                    joins,
                    pruner,
                }),
            );
        }

        info!(entities = entities.len(), "Entity registry built");

        EntityRegistry {
            entities,
            collections,
            order,
        }
    }
}

impl EntityRegistry {
    /// Start building a registry.
    pub fn builder() -> EntityRegistryBuilder {
        EntityRegistryBuilder::default()
    }

    /// Get an entity by name.
    pub fn get(&self, name: &str) -> Option<Arc<ResolvedEntity>> {
        self.entities.get(name).cloned()
    }

    /// Get an entity by name, failing if it is not registered.
    pub fn resolved(&self, name: &str) -> Result<Arc<ResolvedEntity>, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// Get an entity by its collection name.
    pub fn by_collection(&self, collection: &str) -> Option<Arc<ResolvedEntity>> {
        self.collections
            .get(collection)
            .and_then(|name| self.get(name))
    }

    /// Entity names in registration order.
    pub fn entity_names(&self) -> &[String] {
        &self.order
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

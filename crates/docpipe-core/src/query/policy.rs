//! Per-entity filter field allow-lists.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::catalog::{EntityDef, EntityRegistry};
use crate::error::Error;

/// Read-only map from entity name to its filterable fields.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicyRegistry {
    policies: HashMap<String, Vec<String>>,
}

/// Builder for [`FilterPolicyRegistry`].
#[derive(Debug, Default)]
pub struct FilterPolicyBuilder {
    entries: Vec<(String, Option<Vec<String>>)>,
}

impl FilterPolicyBuilder {
    /// Register an entity as filterable.
    ///
    /// `fields` overrides the fields flagged filterable on the entity definition.
    pub fn register(mut self, entity: impl Into<String>, fields: Option<Vec<String>>) -> Self {
        self.entries.push((entity.into(), fields));
        self
    }

    /// Resolve registrations against the entity registry.
    ///
    /// Fails when a registration names an unknown entity.
    pub fn build(self, registry: &EntityRegistry) -> Result<FilterPolicyRegistry, Error> {
        let mut policies = HashMap::with_capacity(self.entries.len());

        for (name, fields) in self.entries {
            let entity = registry.get(&name).ok_or_else(|| {
                Error::Config(format!("filter policy for unknown entity '{}'", name))
            })?;

            let fields = match fields {
                Some(fields) => {
                    for field in &fields {
                        if entity.def.get_field_path(field).is_none() {
                            warn!(
                                entity = %name,
                                field = %field,
                                "Filter field is not declared on entity"
                            );
                        }
                    }
                    fields
                }
                None => entity
                    .def
                    .filterable_fields()
                    .map(|f| f.name.clone())
                    .collect(),
            };

            for field in non_text_fields(&entity.def, &fields) {
                warn!(
                    entity = %name,
                    field = %field,
                    "Filter field is not text, $regex filters will not match it"
                );
            }

            policies.insert(name, fields);
        }

        info!(entities = policies.len(), "Filter policy registry built");
        Ok(FilterPolicyRegistry { policies })
    }
}

/// Fields whose declared scalar type cannot match a text pattern.
fn non_text_fields<'a>(entity: &EntityDef, fields: &'a [String]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|field| {
            entity
                .get_field_path(field)
                .and_then(|def| def.field_type.scalar_type())
                .is_some_and(|scalar| !scalar.is_text_searchable())
        })
        .map(String::as_str)
        .collect()
}

impl FilterPolicyRegistry {
    /// Start building a policy registry.
    pub fn builder() -> FilterPolicyBuilder {
        FilterPolicyBuilder::default()
    }

    /// Filterable fields of an entity; empty when the entity is not registered.
    pub fn fields_for(&self, entity: &str) -> &[String] {
        self.policies
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check if a field may be filtered on.
    pub fn allows(&self, entity: &str, field: &str) -> bool {
        self.fields_for(entity).iter().any(|f| f == field)
    }
}

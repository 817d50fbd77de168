//! Schema reflection over static entity definitions.
//!
//! Walks an entity's fields (recursing into embedded sub-documents with dotted
//! prefixes) and collects reference fields and hidden field paths.

use std::collections::HashMap;

use tracing::warn;

use super::entity::EntityDef;
use super::field::FieldDef;

/// A reference field discovered on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Dotted path of the local field.
    pub path: String,
    /// Referenced entity name.
    pub target_entity: String,
    /// Referenced entity's collection.
    pub target_collection: String,
    /// Referenced entity's identity field.
    pub target_identity: String,
    /// Explicit output alias, if declared on the field.
    pub alias: Option<String>,
    /// Whether the local value is an array (reference-to-many).
    pub many: bool,
}

/// A reference whose target entity is not registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Dotted path of the local field.
    pub path: String,
    /// Target entity name as declared.
    pub target_entity: String,
}

/// Result of reflecting over one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReflection {
    /// Resolved references, in field declaration order.
    pub references: Vec<Reference>,
    /// Hidden field paths, in field declaration order.
    pub hidden: Vec<String>,
    /// References skipped because their target is unknown.
    pub unresolved: Vec<UnresolvedReference>,
}

/// Reflects entity definitions against a set of known entities.
pub struct SchemaReflector<'a> {
    entities: &'a HashMap<String, EntityDef>,
}

impl<'a> SchemaReflector<'a> {
    /// Create a reflector over the given entities, keyed by name.
    pub fn new(entities: &'a HashMap<String, EntityDef>) -> Self {
        Self { entities }
    }

    /// Reflect over an entity.
    pub fn reflect(&self, entity: &EntityDef) -> SchemaReflection {
        let mut reflection = SchemaReflection::default();
        self.walk(entity, &entity.fields, "", false, &mut reflection);
        reflection
    }

    fn walk(
        &self,
        entity: &EntityDef,
        fields: &[FieldDef],
        prefix: &str,
        in_array: bool,
        out: &mut SchemaReflection,
    ) {
        for field in fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };
            let many = in_array || field.field_type.is_array();

            if field.hidden {
                out.hidden.push(path.clone());
            }

            if let Some(reference) = &field.reference {
                match self.entities.get(&reference.entity) {
                    Some(target) => out.references.push(Reference {
                        path: path.clone(),
                        target_entity: target.name.clone(),
                        target_collection: target.collection.clone(),
                        target_identity: target.identity_field.clone(),
                        alias: reference.alias.clone(),
                        many,
                    }),
                    None => {
                        warn!(
                            entity = %entity.name,
                            field = %path,
                            target = %reference.entity,
                            "Skipping reference to unregistered entity"
                        );
                        out.unresolved.push(UnresolvedReference {
                            path: path.clone(),
                            target_entity: reference.entity.clone(),
                        });
                    }
                }
            }

            if let Some(sub_fields) = field.field_type.embedded_fields() {
                self.walk(entity, sub_fields, &path, many, out);
            }
        }
    }
}

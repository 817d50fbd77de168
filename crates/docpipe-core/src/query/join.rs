//! Join specifications derived from schema references.

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::debug;

use crate::catalog::{EntityDef, Reference};

/// A join from a local field to a referenced collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Dotted path of the local field holding foreign identities.
    pub local_field: String,
    /// Referenced entity name.
    pub entity: String,
    /// Referenced collection.
    pub collection: String,
    /// Field on the referenced collection matched against the local value.
    pub foreign_field: String,
    /// Output field the joined documents are written to.
    pub alias: String,
    /// Whether the local field holds many identities.
    pub many: bool,
}

impl JoinSpec {
    /// Create a join against a referenced entity's identity field, aliased by its collection.
    pub fn to_entity(local_field: impl Into<String>, target: &EntityDef) -> Self {
        Self {
            local_field: local_field.into(),
            entity: target.name.clone(),
            collection: target.collection.clone(),
            foreign_field: target.identity_field.clone(),
            alias: target.collection.clone(),
            many: false,
        }
    }

    /// Override the output alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Mark the local field as holding many identities.
    pub fn with_many(mut self, many: bool) -> Self {
        self.many = many;
        self
    }

    /// Compile to a `$lookup` stage document.
    pub fn to_stage(&self) -> Value {
        json!({
            "$lookup": {
                "from": self.collection,
                "localField": self.local_field,
                "foreignField": self.foreign_field,
                "as": self.alias,
            }
        })
    }
}

impl From<&Reference> for JoinSpec {
    fn from(reference: &Reference) -> Self {
        Self {
            local_field: reference.path.clone(),
            entity: reference.target_entity.clone(),
            collection: reference.target_collection.clone(),
            foreign_field: reference.target_identity.clone(),
            alias: reference
                .alias
                .clone()
                .unwrap_or_else(|| reference.target_collection.clone()),
            many: reference.many,
        }
    }
}

/// Resolves reflected references into join specifications.
pub struct JoinResolver;

impl JoinResolver {
    /// Map references to joins, preserving declaration order.
    ///
    /// Duplicate aliases are kept; the later join overwrites the earlier one's output.
    pub fn resolve(entity: &str, references: &[Reference]) -> Vec<JoinSpec> {
        let mut seen = HashSet::new();
        references
            .iter()
            .map(JoinSpec::from)
            .inspect(|join| {
                if !seen.insert(join.alias.clone()) {
                    debug!(
                        entity = %entity,
                        alias = %join.alias,
                        field = %join.local_field,
                        "Duplicate join alias, later join overwrites earlier output"
                    );
                }
            })
            .collect()
    }
}

//! Entity definitions.

use serde::{Deserialize, Serialize};

use super::field::FieldDef;
use super::types::IdentityKind;

/// Default identity field of a document.
pub const DEFAULT_IDENTITY_FIELD: &str = "_id";

/// An entity definition (collection schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within the registry).
    pub name: String,
    /// Store collection name (unique within the registry).
    pub collection: String,
    /// Name of the identity field.
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
    /// Representation of identity values.
    #[serde(default)]
    pub identity_kind: IdentityKind,
    /// Field definitions, in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

impl EntityDef {
    /// Create a new entity definition with an ObjectId `_id` identity.
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            identity_field: default_identity_field(),
            identity_kind: IdentityKind::default(),
            fields: Vec::new(),
        }
    }

    /// Override the identity field and its representation.
    pub fn with_identity(mut self, field: impl Into<String>, kind: IdentityKind) -> Self {
        self.identity_field = field.into();
        self.identity_kind = kind;
        self
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a top-level field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a field by dotted path, descending into embedded sub-documents.
    pub fn get_field_path(&self, path: &str) -> Option<&FieldDef> {
        let mut segments = path.split('.');
        let mut current = self.get_field(segments.next()?)?;
        for segment in segments {
            current = current
                .field_type
                .embedded_fields()?
                .iter()
                .find(|f| f.name == segment)?;
        }
        Some(current)
    }

    /// Names of top-level fields flagged as filterable.
    pub fn filterable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.filterable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldType, ScalarType};

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("User", "users")
            .with_field(FieldDef::new("username", FieldType::scalar(ScalarType::String)).filterable())
            .with_field(FieldDef::new("email", FieldType::scalar(ScalarType::String)).hidden())
            .with_field(FieldDef::new(
                "nickname",
                FieldType::optional_scalar(ScalarType::String),
            ));

        assert_eq!(entity.name, "User");
        assert_eq!(entity.collection, "users");
        assert_eq!(entity.identity_field, "_id");
        assert_eq!(entity.identity_kind, IdentityKind::ObjectId);
        assert_eq!(entity.fields.len(), 3);
        assert_eq!(entity.filterable_fields().count(), 1);
    }

    #[test]
    fn test_get_field_path() {
        let entity = EntityDef::new("User", "users").with_field(FieldDef::new(
            "profile",
            FieldType::embedded(vec![FieldDef::new(
                "city",
                FieldType::scalar(ScalarType::String),
            )]),
        ));

        assert!(entity.get_field("profile").is_some());
        assert!(entity.get_field_path("profile.city").is_some());
        assert!(entity.get_field_path("profile.zip").is_none());
        assert!(entity.get_field_path("nonexistent").is_none());
    }

    #[test]
    fn test_entity_from_json_defaults() {
        let entity: EntityDef =
            serde_json::from_str(r#"{"name": "Tag", "collection": "tags"}"#).unwrap();

        assert_eq!(entity.identity_field, DEFAULT_IDENTITY_FIELD);
        assert_eq!(entity.identity_kind, IdentityKind::ObjectId);
        assert!(entity.fields.is_empty());
    }
}

//! Field definitions for entities.

use serde::{Deserialize, Serialize};

use super::types::FieldType;

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name (a single path segment).
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Excluded from query output unless explicitly selected.
    #[serde(default)]
    pub hidden: bool,
    /// Eligible for free-text and field-targeted filtering.
    #[serde(default)]
    pub filterable: bool,
    /// Reference to another entity, if this field holds foreign identities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<FieldRef>,
}

/// A reference from a field to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Name of the referenced entity.
    pub entity: String,
    /// Output alias for the joined documents. Defaults to the referenced collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl FieldDef {
    /// Create a new field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            hidden: false,
            filterable: false,
            reference: None,
        }
    }

    /// Mark as hidden (pruned from output by default).
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Mark as filterable.
    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Declare a reference to another entity.
    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.reference = Some(FieldRef {
            entity: entity.into(),
            alias: None,
        });
        self
    }

    /// Declare a reference with an explicit output alias.
    pub fn references_as(mut self, entity: impl Into<String>, alias: impl Into<String>) -> Self {
        self.reference = Some(FieldRef {
            entity: entity.into(),
            alias: Some(alias.into()),
        });
        self
    }
}

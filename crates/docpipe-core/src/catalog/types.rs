//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::field::FieldDef;

/// Scalar data types a document field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    String,
    /// Timestamp (ISO-8601 string or epoch millis, store dependent).
    Timestamp,
    /// 12-byte object identifier, hex encoded.
    ObjectId,
    /// UUID (128-bit identifier).
    Uuid,
    /// Untyped JSON value.
    Any,
}

/// Field types.
///
/// Embedded variants carry their own field list so sub-document fields can be
/// reflected with dotted paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An array of scalar values.
    ArrayScalar(ScalarType),
    /// An embedded sub-document.
    Embedded {
        /// Fields of the sub-document.
        fields: Vec<FieldDef>,
    },
    /// An array of embedded sub-documents.
    ArrayEmbedded {
        /// Fields of each sub-document.
        fields: Vec<FieldDef>,
    },
}

/// How identity values of an entity are represented in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// 24 hex characters, stored as `{"$oid": "<hex>"}`.
    #[default]
    ObjectId,
    /// Canonical hyphenated UUID string.
    Uuid,
    /// JSON integer.
    Integer,
    /// Any string, stored verbatim.
    String,
}

impl ScalarType {
    /// Check if values of this type can be matched with a text pattern.
    pub fn is_text_searchable(&self) -> bool {
        matches!(self, ScalarType::String | ScalarType::Any)
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an array of scalars field type.
    pub fn array_scalar(scalar: ScalarType) -> Self {
        FieldType::ArrayScalar(scalar)
    }

    /// Create an embedded sub-document field type.
    pub fn embedded(fields: Vec<FieldDef>) -> Self {
        FieldType::Embedded { fields }
    }

    /// Create an array of embedded sub-documents field type.
    pub fn array_embedded(fields: Vec<FieldDef>) -> Self {
        FieldType::ArrayEmbedded { fields }
    }

    /// Check if this type is an array.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldType::ArrayScalar(_) | FieldType::ArrayEmbedded { .. }
        )
    }

    /// Get the inner scalar type if this is a scalar-based type.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) | FieldType::ArrayScalar(s) => {
                Some(*s)
            }
            _ => None,
        }
    }

    /// Get the sub-document fields if this is an embedded type.
    pub fn embedded_fields(&self) -> Option<&[FieldDef]> {
        match self {
            FieldType::Embedded { fields } | FieldType::ArrayEmbedded { fields } => Some(fields),
            _ => None,
        }
    }
}

impl IdentityKind {
    /// Convert a raw request identifier into its store representation.
    ///
    /// Returns `None` when `raw` is not a valid identifier of this kind.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            IdentityKind::ObjectId => {
                if raw.len() != 24 {
                    return None;
                }
                let bytes = hex::decode(raw).ok()?;
                Some(json!({ "$oid": hex::encode(bytes) }))
            }
            IdentityKind::Uuid => uuid::Uuid::parse_str(raw)
                .ok()
                .map(|id| Value::String(id.hyphenated().to_string())),
            IdentityKind::Integer => raw.parse::<i64>().ok().map(Value::from),
            IdentityKind::String => Some(Value::String(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_checks() {
        assert!(ScalarType::String.is_text_searchable());
        assert!(ScalarType::Any.is_text_searchable());
        assert!(!ScalarType::Int.is_text_searchable());
        assert!(!ScalarType::ObjectId.is_text_searchable());
    }

    #[test]
    fn test_field_type_builders() {
        let int_type = FieldType::scalar(ScalarType::Int);
        assert!(!int_type.is_array());

        let optional_int = FieldType::optional_scalar(ScalarType::Int);
        assert_eq!(optional_int.scalar_type(), Some(ScalarType::Int));

        let int_array = FieldType::array_scalar(ScalarType::Int);
        assert!(int_array.is_array());
        assert_eq!(int_array.scalar_type(), Some(ScalarType::Int));

        let address = FieldType::embedded(vec![FieldDef::new(
            "city",
            FieldType::scalar(ScalarType::String),
        )]);
        assert_eq!(address.embedded_fields().map(|f| f.len()), Some(1));
        assert!(address.scalar_type().is_none());
    }

    #[test]
    fn test_object_id_parsing() {
        let id = IdentityKind::ObjectId.parse("65A1F0C2B3D4E5F601234567");
        assert_eq!(id, Some(json!({ "$oid": "65a1f0c2b3d4e5f601234567" })));

        assert!(IdentityKind::ObjectId.parse("not-an-id").is_none());
        assert!(IdentityKind::ObjectId.parse("zz a1f0c2b3d4e5f60123456").is_none());
    }

    #[test]
    fn test_integer_and_uuid_parsing() {
        assert_eq!(IdentityKind::Integer.parse("42"), Some(json!(42)));
        assert!(IdentityKind::Integer.parse("4x2").is_none());

        let uuid = IdentityKind::Uuid.parse("67E55044-10B1-426F-9247-BB680E5FE0C8");
        assert_eq!(uuid, Some(json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(IdentityKind::Uuid.parse("1234").is_none());

        assert_eq!(IdentityKind::String.parse("abc"), Some(json!("abc")));
    }
}

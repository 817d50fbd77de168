//! Entity catalog.
//!
//! Static entity definitions, schema reflection, and the registry that derives
//! joins and hidden-field pruning for every entity once at start-up.

mod entity;
mod field;
mod reflect;
mod registry;
mod types;

pub use entity::{EntityDef, DEFAULT_IDENTITY_FIELD};
pub use field::{FieldDef, FieldRef};
pub use reflect::{Reference, SchemaReflection, SchemaReflector, UnresolvedReference};
pub use registry::{EntityRegistry, EntityRegistryBuilder, ResolvedEntity};
pub use types::{FieldType, IdentityKind, ScalarType};

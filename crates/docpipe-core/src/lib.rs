//! Docpipe Core - Schema catalog, pipeline building and query execution.
//!
//! This crate turns declared entity schemas and HTTP-style request parameters
//! into aggregation pipelines, runs them against a document store and returns
//! paginated envelopes.

pub mod catalog;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod query;
pub mod store;

pub use catalog::{
    EntityDef, EntityRegistry, EntityRegistryBuilder, FieldDef, FieldRef, FieldType,
    IdentityKind, Reference, ResolvedEntity, ScalarType, SchemaReflection, SchemaReflector,
};
pub use config::{FilterMode, HandlerConfig, DEFAULT_LIMIT};
pub use envelope::{Data, Meta, QueryResponse, ResponseEnvelope};
pub use error::Error;
pub use handler::{ExecContext, ExecMiddleware, FluentHandler, Rejection};
pub use query::{
    Conjunction, ExecIntent, FilterPolicyRegistry, JoinSpec, Limit, MatchInput, ParsedParams,
    PlanBuilder, QueryBuilder, QueryOptions, RequestParams, Stage,
};

// Store exports
pub use store::{Document, DocumentStore, MemoryStore};

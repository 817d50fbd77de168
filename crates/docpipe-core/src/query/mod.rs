//! Query building and execution.
//!
//! - [`join`]: join specifications derived from schema references
//! - [`predicate`]: match condition composition
//! - [`projection`]: hidden-field pruning
//! - [`pipeline`]: stage types and plan assembly
//! - [`policy`]: per-entity filter allow-lists
//! - [`params`]: request parameter parsing
//! - [`executor`]: the query builder and execution engine

pub mod executor;
pub mod join;
pub mod params;
pub mod pipeline;
pub mod policy;
pub mod predicate;
pub mod projection;

pub use executor::{AsyncTransform, QueryBuilder, QueryOptions, Transform};
pub use join::{JoinResolver, JoinSpec};
pub use params::{ExecIntent, Limit, ParsedParams, RequestParams, RESERVED_PARAMS};
pub use pipeline::{plan_documents, PlanBuilder, Stage, COUNT_FIELD};
pub use policy::{FilterPolicyBuilder, FilterPolicyRegistry};
pub use predicate::{Conjunction, MatchInput, PredicateSet};
pub use projection::ProjectionPruner;

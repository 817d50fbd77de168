//! Document store abstraction.
//!
//! A store executes a compiled aggregation pipeline against one collection and
//! returns raw documents. [`MemoryStore`] is an in-process implementation of
//! the stage subset the query builder emits.

mod document;
mod eval;
mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::query::Stage;

pub use document::{compare_values, get_path, set_path, unset_path, values_equal};
pub use eval::Predicate;
pub use memory::MemoryStore;

/// A raw document as returned by a store.
pub type Document = Map<String, Value>;

/// Executes aggregation pipelines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run `pipeline` against `collection` and return the resulting documents.
    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>, Error>;
}

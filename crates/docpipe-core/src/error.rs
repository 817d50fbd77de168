//! Core error types.

use thiserror::Error;

/// Core pipeline errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid start-up configuration (duplicate registration, unknown policy target).
    #[error("configuration error: {0}")]
    Config(String),

    /// Requested entity or collection is not registered.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Store execution failed.
    #[error("store error: {0}")]
    Store(String),

    /// A pipeline stage or match operator could not be evaluated.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// A raw document could not be hydrated into the target type.
    #[error("hydration error: {0}")]
    Hydration(String),

    /// A post-hydration transform failed.
    #[error("transform error: {0}")]
    Transform(String),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

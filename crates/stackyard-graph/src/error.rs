//! Error types for stackyard-graph

use stackyard_backend::BackendError;
use stackyard_core::CoreError;
use thiserror::Error;

/// Result type for stackyard-graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while building or storing resource graphs
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GraphError {
    /// No graph is stored for the scope
    #[error("graph for {project}/{workspace} does not exist")]
    GraphNotExist { project: String, workspace: String },

    /// A graph is already stored for the scope
    #[error("graph for {project}/{workspace} already exists")]
    GraphAlreadyExist { project: String, workspace: String },

    /// Resource id is not in the graph
    #[error("resource '{id}' not found in graph")]
    ResourceNotFound { id: String },

    /// Resource id does not have a recognised shape
    #[error("invalid resource id '{id}': {reason}")]
    InvalidResourceId { id: String, reason: String },

    /// Terraform provider without a known cloud resource id attribute
    #[error("unsupported provider '{provider}' in resource '{id}'")]
    UnsupportedProvider { id: String, provider: String },

    /// Graph belongs to a different project or workspace than the store
    #[error("graph for {found} does not belong to store {expected}")]
    ScopeMismatch { expected: String, found: String },

    #[error(transparent)]
    Validation(#[from] CoreError),

    /// Storage medium error
    #[error("storage error: {0}")]
    Backend(#[from] BackendError),

    /// Document could not be encoded or decoded
    #[error("serialization error in '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

//! Error types for stackyard-core

use thiserror::Error;

use crate::release::ReleasePhase;

/// Result type for stackyard-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Validation and model errors, raised before anything is persisted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error("release must not be empty")]
    EmptyRelease,

    #[error("project must not be empty")]
    EmptyProject,

    #[error("workspace must not be empty")]
    EmptyWorkspace,

    #[error("stack must not be empty")]
    EmptyStack,

    #[error("revision must be greater than zero")]
    EmptyRevision,

    #[error("release spec must not be empty")]
    EmptySpec,

    #[error("release state must not be empty")]
    EmptyState,

    #[error("release phase must not be empty")]
    EmptyPhase,

    #[error("unknown release phase '{0}'")]
    UnknownPhase(String),

    #[error("release create time must be set")]
    EmptyCreateTime,

    #[error("release modified time must be set")]
    EmptyModifiedTime,

    #[error("resource id must not be empty")]
    EmptyResourceId,

    #[error("duplicate resource key '{id}'")]
    DuplicateResourceKey { id: String },

    /// Phase change not permitted by the release state machine
    #[error("cannot move release from phase {from} to {to}")]
    InvalidPhaseTransition { from: ReleasePhase, to: ReleasePhase },
}

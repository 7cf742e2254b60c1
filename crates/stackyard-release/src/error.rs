//! Error types for stackyard-release

use stackyard_backend::BackendError;
use stackyard_core::{CoreError, ReleasePhase};
use thiserror::Error;

/// Result type for stackyard-release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Errors that can occur while storing or orchestrating releases
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    /// Revision is absent from the metadata index
    #[error("release revision {revision} does not exist in {project}/{workspace}")]
    ReleaseNotExist {
        project: String,
        workspace: String,
        revision: u64,
    },

    /// Revision is already recorded in the metadata index
    #[error("release revision {revision} already exists in {project}/{workspace}")]
    ReleaseAlreadyExist {
        project: String,
        workspace: String,
        revision: u64,
    },

    /// Operation needs at least one prior release
    #[error("no release found in {project}/{workspace}")]
    NoRelease { project: String, workspace: String },

    /// Latest release has not reached a terminal phase
    #[error(
        "release revision {revision} in {project}/{workspace} is still {phase}\nHint: wait for it to finish, or unlock it to mark it Failed"
    )]
    ReleaseInFlight {
        project: String,
        workspace: String,
        revision: u64,
        phase: ReleasePhase,
    },

    /// Release belongs to a different project or workspace than the store
    #[error("release for {found} does not belong to store {expected}")]
    ScopeMismatch { expected: String, found: String },

    /// Release or scope failed validation
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
        source: serde_yaml::Error,
    },
}

impl ReleaseError {
    /// Whether the error means the revision is unknown
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::ReleaseNotExist { .. })
    }

    /// Whether the error means the revision was already taken
    pub fn is_already_exist(&self) -> bool {
        matches!(self, Self::ReleaseAlreadyExist { .. })
    }
}

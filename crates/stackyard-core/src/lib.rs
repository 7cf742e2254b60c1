//! Stackyard Core - data model shared by the release and graph stores
//!
//! This crate provides:
//! - **Resources**: Kubernetes and Terraform resources, grouped into a desired
//!   [`Spec`] and an observed [`State`]
//! - **Releases**: the versioned record of one apply/destroy/rollback attempt,
//!   with a phase state machine
//! - **Validation**: checks run before anything is persisted
//! - **Dependency ordering**: kind-precedence `dependsOn` injection

pub mod error;
pub mod order;
pub mod release;
pub mod resource;
pub mod validation;

pub use error::{CoreError, Result};
pub use order::{DEFAULT_ORDERED_KINDS, OrderedKinds, UnknownKindPolicy};
pub use release::{Release, ReleasePhase};
pub use resource::{
    KIND_ATTRIBUTE, Resource, ResourceType, Spec, State, WORKLOAD_EXTENSION_KEY,
};
pub use validation::{
    validate_release, validate_resources, validate_scope, validate_spec, validate_state,
};

//! Stackyard Release - the revisioned release ledger
//!
//! This crate provides:
//! - **Release storage**: one [`ReleaseStorage`] implementation over every
//!   storage medium, with an authoritative metadata index per scope
//! - **Lifecycle**: construction of apply, destroy and rollback releases
//!   under the single in-flight release rule
//! - **Locking**: [`ReleaseManager`] serializes release creation within a
//!   process and can unlock a stuck release

pub mod error;
pub mod lifecycle;
pub mod metadata;
pub mod storage;

pub use error::{ReleaseError, Result};
pub use lifecycle::{
    ReleaseManager, create_destroy_release, create_rollback_release, get_latest_release,
    get_latest_state, new_apply_release, update_apply_release, update_destroy_release,
};
pub use metadata::{ReleaseMetaData, ReleasesMetaData, metadata_key, release_key};
pub use storage::{
    GoogleReleaseStorage, LocalReleaseStorage, MemoryReleaseStorage, OssReleaseStorage,
    ReleaseStorage, ReleaseStore, S3ReleaseStorage, release_storage,
};

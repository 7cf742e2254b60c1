//! Stackyard Backend - storage media for releases and resource graphs
//!
//! This crate provides:
//! - **Backend trait**: read/write/delete/probe of bytes by object key
//! - **Local**: a directory tree on the local filesystem
//! - **S3**: Amazon S3 and compatible services, SigV4-signed
//! - **OSS**: Alibaba Cloud Object Storage Service
//! - **Google**: Google Cloud Storage through its XML API
//! - **Memory**: an in-process medium with operation counters for tests
//! - **Configuration**: serde-friendly selection of a medium and its deadline

pub mod backend;
pub mod config;
pub mod error;
pub mod gcs;
pub mod http;
pub mod local;
pub mod memory;
pub mod oss;
pub mod s3;

pub use backend::{Backend, BackendKind, create_backend, with_deadline};
pub use config::{
    BackendConfig, DEFAULT_TIMEOUT, GoogleConfig, LocalConfig, OssConfig, S3Config, SecretString,
    StoreOptions,
};
pub use error::{BackendError, Result};
pub use gcs::GcsBackend;
pub use http::{HttpObjectBackend, ObjectRequest, RequestSigner};
pub use local::LocalBackend;
pub use memory::{MemoryBackend, OperationCounts};
pub use oss::OssBackend;
pub use s3::S3Backend;

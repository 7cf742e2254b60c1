//! Stackyard Graph - apply status of every managed resource
//!
//! This crate provides:
//! - **Graph model**: workload, dependency and other resources in disjoint
//!   collections, with an id index rebuilt on load
//! - **Generation**: categorization of a spec's resources and their
//!   dependency links
//! - **Resource info**: type, name and cloud resource id parsed from ids
//! - **Graph storage**: one JSON document per scope on any storage medium

pub mod error;
pub mod generate;
pub mod graph;
pub mod info;
pub mod storage;

pub use error::{GraphError, Result};
pub use generate::generate_graph;
pub use graph::{
    Graph, GraphResource, GraphResourceStatus, GraphResources, ResourceCategory, ResourceEntry,
};
pub use info::{ResourceInfo, get_resource_info};
pub use storage::{
    GoogleGraphStorage, GraphStorage, GraphStore, LocalGraphStorage, MemoryGraphStorage,
    OssGraphStorage, S3GraphStorage, graph_key, graph_storage,
};

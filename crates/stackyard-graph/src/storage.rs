//! Graph storage over any backend
//!
//! One JSON document per (project, workspace) at
//! `resources/{project}/{workspace}/graph.json`. The resource index is not
//! stored; it is rebuilt on every load.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use stackyard_backend::{
    Backend, BackendConfig, GcsBackend, LocalBackend, MemoryBackend, OssBackend, S3Backend,
    StoreOptions, create_backend, with_deadline,
};
use stackyard_core::validate_scope;

use crate::error::{GraphError, Result};
use crate::graph::Graph;

/// File name of the graph document
pub const GRAPH_FILE: &str = "graph.json";

/// Key of the graph document for a scope
pub fn graph_key(project: &str, workspace: &str) -> String {
    format!("resources/{}/{}/{}", project, workspace, GRAPH_FILE)
}

/// Graph persistence for one (project, workspace)
#[async_trait]
pub trait GraphStorage: Send + Sync {
    async fn get(&self) -> Result<Graph>;

    /// Store a graph; fails if one already exists
    async fn create(&self, graph: &Graph) -> Result<()>;

    /// Overwrite the stored graph; fails if there is none
    async fn update(&self, graph: &Graph) -> Result<()>;

    /// Remove the stored graph; fails if there is none
    async fn delete(&self) -> Result<()>;

    async fn check_graph_storage_existence(&self) -> Result<bool>;
}

/// [`GraphStorage`] backed by a storage medium
pub struct GraphStore<B: Backend + ?Sized> {
    backend: Arc<B>,
    project: String,
    workspace: String,
    options: StoreOptions,
}

pub type LocalGraphStorage = GraphStore<LocalBackend>;
pub type S3GraphStorage = GraphStore<S3Backend>;
pub type OssGraphStorage = GraphStore<OssBackend>;
pub type GoogleGraphStorage = GraphStore<GcsBackend>;
pub type MemoryGraphStorage = GraphStore<MemoryBackend>;

/// Open graph storage for a scope on the configured medium
pub fn graph_storage(
    config: &BackendConfig,
    project: &str,
    workspace: &str,
    options: StoreOptions,
) -> Result<GraphStore<dyn Backend>> {
    GraphStore::new(create_backend(config)?, project, workspace, options)
}

impl<B: Backend + ?Sized> GraphStore<B> {
    pub fn new(backend: Arc<B>, project: &str, workspace: &str, options: StoreOptions) -> Result<Self> {
        validate_scope(project, workspace)?;
        Ok(Self {
            backend,
            project: project.to_string(),
            workspace: workspace.to_string(),
            options,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    fn key(&self) -> String {
        graph_key(&self.project, &self.workspace)
    }

    fn not_exist(&self) -> GraphError {
        GraphError::GraphNotExist {
            project: self.project.clone(),
            workspace: self.workspace.clone(),
        }
    }

    fn check_scope(&self, graph: &Graph) -> Result<()> {
        graph.validate()?;
        if graph.project != self.project || graph.workspace != self.workspace {
            return Err(GraphError::ScopeMismatch {
                expected: format!("{}/{}", self.project, self.workspace),
                found: format!("{}/{}", graph.project, graph.workspace),
            });
        }
        Ok(())
    }

    async fn write(&self, graph: &Graph) -> Result<()> {
        let key = self.key();
        let data = serde_json::to_vec_pretty(graph).map_err(|source| GraphError::Serialization {
            key: key.clone(),
            source,
        })?;
        debug!(backend = %self.backend.kind(), key = %key, bytes = data.len(), "writing graph");
        with_deadline(
            self.options.timeout,
            "write",
            &key,
            self.backend.write(&key, &data),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl<B: Backend + ?Sized> GraphStorage for GraphStore<B> {
    async fn get(&self) -> Result<Graph> {
        let key = self.key();
        debug!(backend = %self.backend.kind(), key = %key, "reading graph");
        let data = with_deadline(self.options.timeout, "read", &key, self.backend.read(&key))
            .await?
            .ok_or_else(|| self.not_exist())?;

        let mut graph: Graph =
            serde_json::from_slice(&data).map_err(|source| GraphError::Serialization {
                key: key.clone(),
                source,
            })?;
        graph.resources.update_resource_index();
        Ok(graph)
    }

    async fn create(&self, graph: &Graph) -> Result<()> {
        self.check_scope(graph)?;
        if self.check_graph_storage_existence().await? {
            return Err(GraphError::GraphAlreadyExist {
                project: self.project.clone(),
                workspace: self.workspace.clone(),
            });
        }
        self.write(graph).await?;
        info!(
            project = %self.project,
            workspace = %self.workspace,
            resources = graph.resources.len(),
            "created graph"
        );
        Ok(())
    }

    async fn update(&self, graph: &Graph) -> Result<()> {
        self.check_scope(graph)?;
        if !self.check_graph_storage_existence().await? {
            return Err(self.not_exist());
        }
        self.write(graph).await
    }

    async fn delete(&self) -> Result<()> {
        if !self.check_graph_storage_existence().await? {
            return Err(self.not_exist());
        }
        let key = self.key();
        with_deadline(self.options.timeout, "delete", &key, self.backend.delete(&key)).await?;
        info!(project = %self.project, workspace = %self.workspace, "deleted graph");
        Ok(())
    }

    async fn check_graph_storage_existence(&self) -> Result<bool> {
        let key = self.key();
        Ok(with_deadline(self.options.timeout, "probe", &key, self.backend.exists(&key)).await?)
    }
}

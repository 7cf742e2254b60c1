//! Release storage over any backend
//!
//! [`ReleaseStore`] implements [`ReleaseStorage`] once for every medium. The
//! metadata index is loaded when the store is opened and kept as an immutable
//! snapshot that each successful `create` replaces as a whole.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use stackyard_backend::{
    Backend, BackendConfig, GcsBackend, LocalBackend, MemoryBackend, OssBackend, S3Backend,
    StoreOptions, create_backend, with_deadline,
};
use stackyard_core::{Release, validate_release, validate_scope};

use crate::error::{ReleaseError, Result};
use crate::metadata::{
    ReleaseMetaData, ReleasesMetaData, decode_metadata, decode_release, encode_metadata,
    encode_release, metadata_key, release_key,
};

/// Revisioned release ledger for one (project, workspace)
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ReleaseStorage: Send + Sync {
    fn project(&self) -> &str;

    fn workspace(&self) -> &str;

    /// Get a release by revision; only revisions in the index are visible
    async fn get(&self, revision: u64) -> Result<Release>;

    /// All revisions, ascending
    async fn get_revisions(&self) -> Vec<u64>;

    /// Revisions created for `stack`, ascending
    async fn get_stack_bound_revisions(&self, stack: &str) -> Vec<u64>;

    /// Latest revision, or 0 when nothing was ever created
    async fn get_latest_revision(&self) -> u64;

    /// Record a new release
    async fn create(&self, release: &Release) -> Result<()>;

    /// Overwrite an existing release document
    async fn update(&self, release: &Release) -> Result<()>;

    /// Index entries in revision order
    async fn list_metadata(&self) -> Vec<ReleaseMetaData>;
}

/// [`ReleaseStorage`] backed by a storage medium
pub struct ReleaseStore<B: Backend + ?Sized> {
    backend: Arc<B>,
    project: String,
    workspace: String,
    options: StoreOptions,
    metadata: RwLock<Arc<ReleasesMetaData>>,
}

pub type LocalReleaseStorage = ReleaseStore<LocalBackend>;
pub type S3ReleaseStorage = ReleaseStore<S3Backend>;
pub type OssReleaseStorage = ReleaseStore<OssBackend>;
pub type GoogleReleaseStorage = ReleaseStore<GcsBackend>;
pub type MemoryReleaseStorage = ReleaseStore<MemoryBackend>;

/// Open release storage for a scope on the configured medium
pub async fn release_storage(
    config: &BackendConfig,
    project: &str,
    workspace: &str,
    options: StoreOptions,
) -> Result<ReleaseStore<dyn Backend>> {
    let backend = create_backend(config)?;
    ReleaseStore::open(backend, project, workspace, options).await
}

impl<B: Backend + ?Sized> ReleaseStore<B> {
    /// Open the store, loading the metadata index
    ///
    /// A missing metadata document means the scope has no history yet.
    pub async fn open(
        backend: Arc<B>,
        project: &str,
        workspace: &str,
        options: StoreOptions,
    ) -> Result<Self> {
        validate_scope(project, workspace)?;
        let store = Self {
            backend,
            project: project.to_string(),
            workspace: workspace.to_string(),
            options,
            metadata: RwLock::new(Arc::new(ReleasesMetaData::default())),
        };
        let metadata = store.load_metadata().await?;
        *store.metadata.write().await = Arc::new(metadata);
        Ok(store)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Current metadata snapshot
    pub async fn metadata(&self) -> Arc<ReleasesMetaData> {
        Arc::clone(&*self.metadata.read().await)
    }

    /// Re-read the metadata index from the medium
    pub async fn reload(&self) -> Result<()> {
        let mut guard = self.metadata.write().await;
        *guard = Arc::new(self.load_metadata().await?);
        Ok(())
    }

    async fn load_metadata(&self) -> Result<ReleasesMetaData> {
        let key = metadata_key(&self.project, &self.workspace);
        let data = self.read(&key).await?;
        decode_metadata(data.as_deref(), &key)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        debug!(backend = %self.backend.kind(), key, "reading");
        Ok(with_deadline(self.options.timeout, "read", key, self.backend.read(key)).await?)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        debug!(backend = %self.backend.kind(), key, bytes = data.len(), "writing");
        Ok(with_deadline(self.options.timeout, "write", key, self.backend.write(key, data)).await?)
    }

    fn check_scope(&self, release: &Release) -> Result<()> {
        if release.project != self.project || release.workspace != self.workspace {
            return Err(ReleaseError::ScopeMismatch {
                expected: format!("{}/{}", self.project, self.workspace),
                found: format!("{}/{}", release.project, release.workspace),
            });
        }
        Ok(())
    }

    fn not_exist(&self, revision: u64) -> ReleaseError {
        ReleaseError::ReleaseNotExist {
            project: self.project.clone(),
            workspace: self.workspace.clone(),
            revision,
        }
    }
}

#[async_trait]
impl<B: Backend + ?Sized> ReleaseStorage for ReleaseStore<B> {
    fn project(&self) -> &str {
        &self.project
    }

    fn workspace(&self) -> &str {
        &self.workspace
    }

    async fn get(&self, revision: u64) -> Result<Release> {
        if !self.metadata().await.contains(revision) {
            return Err(self.not_exist(revision));
        }
        let key = release_key(&self.project, &self.workspace, revision);
        let data = self
            .read(&key)
            .await?
            .ok_or_else(|| self.not_exist(revision))?;
        decode_release(&data, &key)
    }

    async fn get_revisions(&self) -> Vec<u64> {
        self.metadata().await.revisions()
    }

    async fn get_stack_bound_revisions(&self, stack: &str) -> Vec<u64> {
        self.metadata().await.stack_bound_revisions(stack)
    }

    async fn get_latest_revision(&self) -> u64 {
        self.metadata().await.latest_revision
    }

    async fn create(&self, release: &Release) -> Result<()> {
        validate_release(release)?;
        self.check_scope(release)?;

        // Holding the write guard serializes creates within this process
        let mut guard = self.metadata.write().await;

        // Pick up revisions recorded by other processes since the last load
        let current = self.load_metadata().await?;
        if current.contains(release.revision) {
            *guard = Arc::new(current);
            return Err(ReleaseError::ReleaseAlreadyExist {
                project: self.project.clone(),
                workspace: self.workspace.clone(),
                revision: release.revision,
            });
        }

        let data_key = release_key(&self.project, &self.workspace, release.revision);
        self.write(&data_key, &encode_release(release, &data_key)?)
            .await?;

        let next = current.with_release(release);
        let meta_key = metadata_key(&self.project, &self.workspace);
        let written = match encode_metadata(&next, &meta_key) {
            Ok(data) => self.write(&meta_key, &data).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(
                key = %data_key,
                error = %e,
                "release document written but metadata update failed; document is orphaned"
            );
            *guard = Arc::new(current);
            return Err(e);
        }
        *guard = Arc::new(next);

        info!(
            project = %self.project,
            workspace = %self.workspace,
            revision = release.revision,
            stack = %release.stack,
            phase = %release.phase,
            "created release"
        );
        Ok(())
    }

    async fn update(&self, release: &Release) -> Result<()> {
        validate_release(release)?;
        self.check_scope(release)?;
        if !self.metadata().await.contains(release.revision) {
            return Err(self.not_exist(release.revision));
        }

        let key = release_key(&self.project, &self.workspace, release.revision);
        self.write(&key, &encode_release(release, &key)?).await?;
        info!(
            project = %self.project,
            workspace = %self.workspace,
            revision = release.revision,
            phase = %release.phase,
            "updated release"
        );
        Ok(())
    }

    async fn list_metadata(&self) -> Vec<ReleaseMetaData> {
        self.metadata().await.entries()
    }
}

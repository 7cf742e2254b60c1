//! Local filesystem medium
//!
//! Object keys map onto paths under a root directory. Useful for:
//! - Single-user workstations
//! - Development and testing without cloud credentials
//! - Backup/restore of a remote store

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::backend::{Backend, BackendKind, check_key};
use crate::error::{BackendError, Result};

/// Filesystem-backed medium
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a local backend, creating the root directory if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| BackendError::io("create", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, seg| path.join(seg)))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        debug!(path = %path.display(), "reading local object");
        match std::fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::io("read", path, e)),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        debug!(path = %path.display(), bytes = data.len(), "writing local object");

        let parent = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(|e| BackendError::io("create", parent, e))?;

        // Write a uniquely named sibling and rename it over the target so
        // readers never see a torn file and writers never share a temp file
        let mut tmp =
            NamedTempFile::new_in(parent).map_err(|e| BackendError::io("create", parent, e))?;
        tmp.write_all(data)
            .map_err(|e| BackendError::io("write", tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| BackendError::io("rename", &path, e.error))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        debug!(path = %path.display(), "deleting local object");
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BackendError::io("delete", path, e)),
        }

        // Clean up directories emptied by the removal, never the root itself
        let mut dir = path.parent().map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            let empty = std::fs::read_dir(&current)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty || std::fs::remove_dir(&current).is_err() {
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();

        backend
            .write("releases/shop/dev/1.yaml", b"revision: 1")
            .await
            .unwrap();

        let data = backend.read("releases/shop/dev/1.yaml").await.unwrap();
        assert_eq!(data.as_deref(), Some(b"revision: 1".as_slice()));
        assert!(tmp.path().join("releases/shop/dev/1.yaml").is_file());
        let entries = std::fs::read_dir(tmp.path().join("releases/shop/dev"))
            .unwrap()
            .count();
        assert_eq!(entries, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_local_concurrent_writes_to_one_key() {
        let tmp = TempDir::new().unwrap();
        let backend = Arc::new(LocalBackend::new(tmp.path()).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move {
                    let data = format!("latestRevision: {i}");
                    backend
                        .write("releases/shop/dev/.metadata.yml", data.as_bytes())
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let data = backend
            .read("releases/shop/dev/.metadata.yml")
            .await
            .unwrap()
            .unwrap();
        assert!(String::from_utf8(data).unwrap().starts_with("latestRevision: "));
        let entries = std::fs::read_dir(tmp.path().join("releases/shop/dev"))
            .unwrap()
            .count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_local_read_missing() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();

        assert_eq!(backend.read("releases/shop/dev/9.yaml").await.unwrap(), None);
        assert!(!backend.exists("releases/shop/dev/9.yaml").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_overwrite() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();

        backend.write("resources/shop/dev/graph.json", b"{}").await.unwrap();
        backend
            .write("resources/shop/dev/graph.json", b"{\"a\":1}")
            .await
            .unwrap();

        let data = backend.read("resources/shop/dev/graph.json").await.unwrap();
        assert_eq!(data.as_deref(), Some(b"{\"a\":1}".as_slice()));
    }

    #[tokio::test]
    async fn test_local_delete_cleans_empty_dirs() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();

        backend.write("resources/shop/dev/graph.json", b"{}").await.unwrap();
        backend.delete("resources/shop/dev/graph.json").await.unwrap();

        assert!(!backend.exists("resources/shop/dev/graph.json").await.unwrap());
        assert!(!tmp.path().join("resources").exists());
        assert!(tmp.path().exists());

        // Deleting again is not an error
        backend.delete("resources/shop/dev/graph.json").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::new(tmp.path()).unwrap();

        let result = backend.write("../outside", b"x").await;
        assert!(matches!(result, Err(BackendError::InvalidKey { .. })));
    }
}

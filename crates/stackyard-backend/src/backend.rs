//! Unified storage medium trait
//!
//! Release and graph storage are written once against [`Backend`]; each
//! medium only knows how to move bytes for a `/`-separated object key.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::gcs::GcsBackend;
use crate::local::LocalBackend;
use crate::memory::MemoryBackend;
use crate::oss::OssBackend;
use crate::s3::S3Backend;

/// Which medium a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    S3,
    Oss,
    Google,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::S3 => "s3",
            Self::Oss => "oss",
            Self::Google => "google",
            Self::Memory => "memory",
        };
        f.write_str(s)
    }
}

/// Byte storage addressed by object key
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Read an object; `None` when it does not exist
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or overwrite an object
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Remove an object; removing a missing object succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read(key).await?.is_some())
    }
}

/// Create a backend from configuration
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    config.validate()?;
    let backend: Arc<dyn Backend> = match config {
        BackendConfig::Local(local) => Arc::new(LocalBackend::new(&local.path)?),
        BackendConfig::S3(s3) => Arc::new(S3Backend::from_config(s3)?),
        BackendConfig::Oss(oss) => Arc::new(OssBackend::from_config(oss)?),
        BackendConfig::Google(google) => Arc::new(GcsBackend::from_config(google)?),
        BackendConfig::Memory => Arc::new(MemoryBackend::new()),
    };
    Ok(backend)
}

/// Run a storage call under a deadline
///
/// Storage calls are not cancellable mid-flight by the media themselves;
/// dropping the future at the deadline abandons the request.
pub async fn with_deadline<T, F>(timeout: Duration, op: &'static str, key: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout {
            op,
            key: key.to_string(),
            after: timeout,
        }),
    }
}

/// Reject keys that would escape the medium's root
pub(crate) fn check_key(key: &str) -> Result<()> {
    let invalid = |reason: &str| BackendError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("key must be relative"));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(invalid("key contains an empty, '.' or '..' segment"));
    }
    Ok(())
}

/// Prepend an optional prefix to a key
pub(crate) fn prefixed_key(prefix: Option<&str>, key: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')) {
        Some(p) if !p.is_empty() => format!("{}/{}", p, key),
        _ => key.to_string(),
    }
}

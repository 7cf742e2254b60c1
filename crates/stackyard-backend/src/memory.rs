//! In-memory medium for testing
//!
//! Objects live in a shared map, so clones observe the same data. Operation
//! counters and write-failure injection support assertions in store tests
//! without a filesystem or object service.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::{Backend, BackendKind, check_key};
use crate::error::{BackendError, Result};

/// In-memory medium
#[derive(Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    operations: Arc<RwLock<OperationCounts>>,
    failing_writes: Arc<RwLock<HashSet<String>>>,
}

/// Counts of operations performed, for test assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub reads: usize,
    pub writes: usize,
    pub deletes: usize,
    pub probes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        *self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner) = OperationCounts::default();
    }

    /// Make every write to `key` fail until [`clear_failures`](Self::clear_failures)
    pub fn fail_writes_to(&self, key: impl Into<String>) {
        self.failing_writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    pub fn clear_failures(&self) {
        self.failing_writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn count(&self, update: impl FnOnce(&mut OperationCounts)) {
        let mut operations = self.operations.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut *operations);
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("keys", &self.keys())
            .finish()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        self.count(|ops| ops.reads += 1);
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        check_key(key)?;
        self.count(|ops| ops.writes += 1);

        let failing = self
            .failing_writes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key);
        if failing {
            return Err(BackendError::io(
                "write",
                key,
                std::io::Error::other("injected write failure"),
            ));
        }

        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.count(|ops| ops.deletes += 1);
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        self.count(|ops| ops.probes += 1);
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }
}

//! In-memory storage backend

use async_trait::async_trait;
use parking_lot::RwLock;
use url::Url;

use crate::backend::{RegistryStore, Snapshot};
use crate::error::StorageError;

/// In-memory storage backend
///
/// Lives for the lifetime of the process. The lock only guards individual
/// map operations and is never held across an await point.
#[derive(Default)]
pub struct MemoryStore {
    upstreams: RwLock<Snapshot>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn put(&self, name: &str, target: &Url) -> Result<(), StorageError> {
        self.upstreams
            .write()
            .insert(name.to_string(), target.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.upstreams.write().remove(name);
        Ok(())
    }

    async fn all(&self) -> Result<Snapshot, StorageError> {
        Ok(self.upstreams.read().clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

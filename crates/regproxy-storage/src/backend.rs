//! Registry store trait

use async_trait::async_trait;
use std::collections::BTreeMap;
use url::Url;

use crate::error::StorageError;

/// Point-in-time copy of the upstream name to target mapping.
///
/// Always an owned value: mutating a snapshot never reaches the store.
pub type Snapshot = BTreeMap<String, Url>;

/// Registry store trait
///
/// Implementations persist the mapping from upstream name to target URL.
/// Writers are expected to be serialized by the caller; a store only has to
/// keep each individual call consistent.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert or overwrite an upstream
    async fn put(&self, name: &str, target: &Url) -> Result<(), StorageError>;

    /// Remove an upstream; removing an unknown name is not an error
    async fn remove(&self, name: &str) -> Result<(), StorageError>;

    /// Read the full mapping
    async fn all(&self) -> Result<Snapshot, StorageError>;

    /// Short description of the backend for logs
    fn describe(&self) -> String;
}

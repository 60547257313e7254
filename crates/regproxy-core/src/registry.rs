//! Upstream registry
//!
//! The registry owns the store and the single write lock that serializes
//! registrations. Reads go straight to the store and never wait on that
//! lock, so a dispatch running next to a registration may or may not see
//! the new entry.

use std::sync::Arc;

use regproxy_storage::{RegistryStore, Snapshot};
use tokio::sync::Mutex;
use tracing::info;
use url::Url;

use crate::error::CoreError;

/// A registered upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEntry {
    pub name: String,
    pub target: Url,
}

/// Upstream registry backed by a swappable store
pub struct Registry {
    store: Arc<dyn RegistryStore>,
    write_lock: Mutex<()>,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Register `name` at `callback`, replacing any existing registration
    pub async fn register(&self, name: &str, callback: &str) -> Result<Url, CoreError> {
        validate_name(name)?;
        let target = parse_callback(callback)?;

        let _guard = self.write_lock.lock().await;
        info!("Adding upstream {} -> {}", name, target);
        self.store.put(name, &target).await?;

        Ok(target)
    }

    /// Remove `name`; unknown names are ignored
    pub async fn deregister(&self, name: &str) -> Result<(), CoreError> {
        let _guard = self.write_lock.lock().await;
        info!("Removing upstream {}", name);
        self.store.remove(name).await?;
        Ok(())
    }

    /// Current upstream set
    pub async fn snapshot(&self) -> Result<Snapshot, CoreError> {
        Ok(self.store.all().await?)
    }

    /// Current upstream set as entries, ordered by name
    pub async fn list(&self) -> Result<Vec<UpstreamEntry>, CoreError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .into_iter()
            .map(|(name, target)| UpstreamEntry { name, target })
            .collect())
    }

    /// Description of the backing store
    pub fn describe(&self) -> String {
        self.store.describe()
    }
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::InvalidRegistration(
            "upstream name must not be empty".to_string(),
        ));
    }

    // These would corrupt the line-oriented file store
    if name.contains('=') || name.contains('\n') || name.contains('\r') {
        return Err(CoreError::InvalidRegistration(format!(
            "upstream name {:?} must not contain '=' or line breaks",
            name
        )));
    }

    Ok(())
}

/// Parse a callback URL; only absolute http(s) URLs with a host are accepted
fn parse_callback(callback: &str) -> Result<Url, CoreError> {
    let url = Url::parse(callback).map_err(|e| {
        CoreError::InvalidRegistration(format!("invalid callback url {:?}: {}", callback, e))
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(CoreError::InvalidRegistration(format!(
                "callback scheme '{}' is not supported, use http or https",
                scheme
            )));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(CoreError::InvalidRegistration(format!(
            "callback url {:?} has no host",
            callback
        )));
    }

    Ok(url)
}

//! File-backed storage backend

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use crate::backend::{RegistryStore, Snapshot};
use crate::codec::{parse_snapshot, render_snapshot};
use crate::error::StorageError;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// File-backed storage backend
///
/// The file is the only state: every read parses it and every mutation is a
/// full read-modify-write that replaces the file atomically. Callers must
/// serialize `put` and `remove`, otherwise two concurrent writers can lose
/// each other's update.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open a file store, creating an empty file if none exists.
    ///
    /// Fails if the existing content contains a malformed line.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        match fs::read_to_string(&path).await {
            Ok(content) => {
                let snapshot = parse_snapshot(&content)?;
                for (name, target) in &snapshot {
                    info!("Adding upstream from file: {} -> {}", name, target);
                }
                info!(
                    "Loaded {} upstream(s) from {:?}",
                    snapshot.len(),
                    path
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&path, b"").await?;
                info!("Created empty registry file at {:?}", path);
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        Ok(Self { path })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file content with `snapshot` via temp file and rename
    async fn write(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let content = render_snapshot(snapshot);
        let path = self.path.clone();
        debug!("Rewriting registry file {:?} ({} entries)", path, snapshot.len());

        tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes()))
            .await
            .map_err(|e| StorageError::Backend(format!("Task join error: {}", e)))?
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let temp_file = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut file = temp_file.as_file();
        file.write_all(content)?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        let mut perms = temp_file.as_file().metadata()?.permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(temp_file.path(), perms)?;
    }

    temp_file
        .persist(path)
        .map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl RegistryStore for FileStore {
    async fn put(&self, name: &str, target: &Url) -> Result<(), StorageError> {
        let mut snapshot = self.all().await?;
        snapshot.insert(name.to_string(), target.clone());
        self.write(&snapshot).await
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let mut snapshot = self.all().await?;
        snapshot.remove(name);
        self.write(&snapshot).await
    }

    async fn all(&self) -> Result<Snapshot, StorageError> {
        let content = fs::read_to_string(&self.path).await?;
        parse_snapshot(&content)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

//! Typed on-disk JSON repositories with atomic writes.
//!
//! Each mutable store (API keys, outbound credentials, agent registry,
//! trust history) is modeled as a typed repository behind an interface,
//! with a JSON-on-disk implementation using temp-file-then-rename for
//! atomicity and an in-memory implementation for tests. Concurrent
//! writers are serialized by an internal per-repository mutex.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait JsonRepository<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self) -> std::io::Result<T>;
    async fn save(&self, value: &T) -> std::io::Result<()>;
}

/// On-disk JSON store. Writes go to `<path>.tmp` then are renamed over the
/// target so a reader never observes a half-written file.
pub struct FileRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn write_permissions(path: &Path) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }
        #[cfg(not(unix))]
        {
            let _ = path;
        }
        Ok(())
    }
}

#[async_trait]
impl<T> JsonRepository<T> for FileRepository
where
    T: Serialize + DeserializeOwned + Send + Sync + Default,
{
    async fn load(&self) -> std::io::Result<T> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                Ok(value)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, value: &T) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        Self::write_permissions(&tmp_path)?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for unit tests; never touches the filesystem.
pub struct InMemoryRepository<T> {
    value: Mutex<T>,
}

impl<T: Clone + Default> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(T::default()),
        }
    }
}

impl<T: Clone + Default> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> JsonRepository<T> for InMemoryRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone + Default,
{
    async fn load(&self) -> std::io::Result<T> {
        Ok(self.value.lock().await.clone())
    }

    async fn save(&self, value: &T) -> std::io::Result<()> {
        *self.value.lock().await = value.clone();
        Ok(())
    }
}

pub type SharedRepository<T> = Arc<dyn JsonRepository<T>>;

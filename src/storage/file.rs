//! Local directory blob store.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::storage::BlobStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBlobStoreConfig {
    /// Directory that keys are resolved against.
    pub path: PathBuf,
}

impl FileBlobStoreConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileBlobStoreConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}

/// Blob store backed by files under a root directory.
#[derive(Debug)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(config: FileBlobStoreConfig) -> Self {
        Self { root: config.path }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(LensError::invalid_argument(format!(
                "invalid blob key '{key}'"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(LensError::not_found(format!("{}", path.display())))
            }
            Err(err) => Err(LensError::storage(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

//! Blob storage for index artifacts and query images.
//!
//! The service never writes through this interface; it only fetches
//! whole objects by key at startup.

pub mod file;
pub mod memory;
pub mod supabase;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use self::file::{FileBlobStore, FileBlobStoreConfig};
use self::memory::{MemoryBlobStore, MemoryBlobStoreConfig};
use self::supabase::{SupabaseBlobStore, SupabaseBlobStoreConfig};

/// Read-only object store addressed by string keys.
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Fetch the full contents of `key`.
    ///
    /// Missing objects are reported as [`LensError::NotFound`](crate::error::LensError::NotFound).
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Blob store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    File(FileBlobStoreConfig),
    Memory(MemoryBlobStoreConfig),
    Supabase(SupabaseBlobStoreConfig),
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        BlobStoreConfig::File(FileBlobStoreConfig::default())
    }
}

pub struct BlobStoreFactory;

impl BlobStoreFactory {
    pub fn create(config: BlobStoreConfig) -> Result<Arc<dyn BlobStore>> {
        match config {
            BlobStoreConfig::File(config) => Ok(Arc::new(FileBlobStore::new(config))),
            BlobStoreConfig::Memory(config) => Ok(Arc::new(MemoryBlobStore::new(config))),
            BlobStoreConfig::Supabase(config) => Ok(Arc::new(SupabaseBlobStore::new(config)?)),
        }
    }
}

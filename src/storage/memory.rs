//! In-memory blob store, used for tests and embedding fixtures.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::storage::BlobStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBlobStoreConfig {}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(_config: MemoryBlobStoreConfig) -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.write().insert(key.into(), bytes.into());
    }

    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.write().remove(key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| LensError::not_found(key.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

//! Relational metadata lookup.
//!
//! A [`MetadataStore`] resolves a batch of image ids to
//! [`MetadataRecord`]s. The [`MetadataResolver`] splits candidate ids into
//! chunks and tolerates per-chunk failures.

pub mod memory;
pub mod postgrest;
pub mod record;
pub mod resolver;

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use self::record::{Brand, EntityId, MetadataRecord, Product, Variant};
pub use self::resolver::{ChunkFailure, MetadataResolver, Resolution};

use self::memory::MemoryMetadataStore;
use self::postgrest::{PostgrestMetadataStore, PostgrestMetadataStoreConfig};

/// Batched, read-only access to catalog records.
#[async_trait]
pub trait MetadataStore: Send + Sync + Debug {
    /// Fetch the records for `ids`. Ids without a row are omitted from
    /// the result; that is not an error.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<MetadataRecord>>;

    fn name(&self) -> &str;
}

/// Local JSON file holding an array of records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonMetadataStoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataStoreConfig {
    Postgrest(PostgrestMetadataStoreConfig),
    Json(JsonMetadataStoreConfig),
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        MetadataStoreConfig::Postgrest(PostgrestMetadataStoreConfig::default())
    }
}

pub struct MetadataStoreFactory;

impl MetadataStoreFactory {
    pub async fn create(config: MetadataStoreConfig) -> Result<Arc<dyn MetadataStore>> {
        match config {
            MetadataStoreConfig::Postgrest(config) => {
                Ok(Arc::new(PostgrestMetadataStore::new(config)?))
            }
            MetadataStoreConfig::Json(config) => {
                Ok(Arc::new(MemoryMetadataStore::from_json_file(&config.path).await?))
            }
        }
    }
}

//! Service configuration.
//!
//! Loaded from TOML. Every section has defaults, so an empty file yields a
//! service on `0.0.0.0:8000` that reads index files from `./data` and embeds
//! queries with the in-process CLIP model.
//!
//! ```toml
//! [server]
//! port = 8000
//!
//! [blob_store]
//! type = "supabase"
//! bucket = "faiss"
//!
//! [metadata_store]
//! type = "postgrest"
//! table = "product_images"
//!
//! [[modes]]
//! name = "structure"
//! structure_sensitive = true
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbedderConfig;
use crate::error::{LensError, Result};
use crate::metadata::MetadataStoreConfig;
use crate::metadata::resolver::DEFAULT_CHUNK_SIZE;
use crate::registry::{IndexKeys, IndexMode};
use crate::service::{DEFAULT_MODE, DEFAULT_THRESHOLD, DEFAULT_TOP_K};
use crate::storage::BlobStoreConfig;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline for one search request; 0 disables it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Concurrent embedding calls; 0 means one per CPU.
    #[serde(default)]
    pub max_concurrent_inference: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_inference: 0,
            max_upload_bytes: default_max_upload_bytes(),
            cors_allow_any: true,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_top_k() -> i64 {
    DEFAULT_TOP_K
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_concurrency() -> usize {
    1
}

/// Request defaults and metadata batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_mode")]
    pub default_mode: String,
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,
    #[serde(default = "default_top_k")]
    pub default_top_k: i64,
    #[serde(default = "default_chunk_size")]
    pub metadata_chunk_size: usize,
    #[serde(default = "default_concurrency")]
    pub metadata_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            default_threshold: default_threshold(),
            default_top_k: default_top_k(),
            metadata_chunk_size: default_chunk_size(),
            metadata_concurrency: default_concurrency(),
        }
    }
}

fn default_modes() -> Vec<IndexMode> {
    IndexMode::defaults()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default = "default_modes")]
    pub modes: Vec<IndexMode>,
    #[serde(default)]
    pub index_keys: IndexKeys,
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
    #[serde(default)]
    pub metadata_store: MetadataStoreConfig,
    #[serde(default)]
    pub embedder: EmbedderConfig,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            modes: default_modes(),
            index_keys: IndexKeys::default(),
            blob_store: BlobStoreConfig::default(),
            metadata_store: MetadataStoreConfig::default(),
            embedder: EmbedderConfig::default(),
        }
    }
}

impl LensConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LensConfig = toml::from_str(content)
            .map_err(|e| LensError::invalid_config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LensError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Fill Supabase credentials into every backend that talks to Supabase.
    /// Values given here take precedence over the file.
    pub fn apply_supabase_credentials(&mut self, url: Option<&str>, key: Option<&str>) {
        if let BlobStoreConfig::Supabase(store) = &mut self.blob_store {
            if let Some(url) = url {
                store.url = url.to_string();
            }
            if let Some(key) = key {
                store.key = key.to_string();
            }
        }
        if let MetadataStoreConfig::Postgrest(store) = &mut self.metadata_store {
            if let Some(url) = url {
                store.url = url.to_string();
            }
            if let Some(key) = key {
                store.key = key.to_string();
            }
        }
    }

    pub fn mode(&self, name: &str) -> Option<&IndexMode> {
        self.modes.iter().find(|mode| mode.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(LensError::invalid_config("at least one mode is required"));
        }
        let mut seen = HashSet::new();
        for mode in &self.modes {
            if mode.name.is_empty() {
                return Err(LensError::invalid_config("mode names must not be empty"));
            }
            if !seen.insert(mode.name.as_str()) {
                return Err(LensError::invalid_config(format!(
                    "mode '{}' is defined more than once",
                    mode.name
                )));
            }
        }
        if self.mode(&self.search.default_mode).is_none() {
            return Err(LensError::invalid_config(format!(
                "default mode '{}' is not one of the configured modes",
                self.search.default_mode
            )));
        }
        if self.search.metadata_chunk_size == 0 {
            return Err(LensError::invalid_config(
                "metadata_chunk_size must be greater than zero",
            ));
        }
        if !self.index_keys.index.contains("{mode}") || !self.index_keys.id_map.contains("{mode}") {
            return Err(LensError::invalid_config(
                "index key templates must contain {mode}",
            ));
        }
        Ok(())
    }
}

//! Embedding providers.
//!
//! An [`Embedder`] turns a decoded image or a text query into a raw
//! embedding vector. Providers do not normalize; the
//! [`QueryEncoder`](crate::encoder::QueryEncoder) does that exactly once.

#[cfg(feature = "embeddings-multimodal")]
pub mod candle_clip_embedder;
pub mod embedder;
pub mod http_embedder;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use self::embedder::Embedder;
use self::http_embedder::{HttpEmbedder, HttpEmbedderConfig};

fn default_clip_model() -> String {
    "openai/clip-vit-base-patch32".to_string()
}

fn default_clip_revision() -> String {
    "refs/pr/15".to_string()
}

/// Settings for the in-process CLIP model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipEmbedderConfig {
    /// Hugging Face model repository.
    #[serde(default = "default_clip_model")]
    pub model: String,
    /// Repository revision holding `model.safetensors`.
    #[serde(default = "default_clip_revision")]
    pub revision: String,
}

impl Default for ClipEmbedderConfig {
    fn default() -> Self {
        Self {
            model: default_clip_model(),
            revision: default_clip_revision(),
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbedderConfig {
    Clip(ClipEmbedderConfig),
    Http(HttpEmbedderConfig),
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        EmbedderConfig::Clip(ClipEmbedderConfig::default())
    }
}

pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Build the configured provider. Loading CLIP weights blocks, so call
    /// this from a blocking context.
    pub fn create(config: EmbedderConfig) -> Result<Arc<dyn Embedder>> {
        match config {
            EmbedderConfig::Http(config) => Ok(Arc::new(HttpEmbedder::new(config)?)),
            #[cfg(feature = "embeddings-multimodal")]
            EmbedderConfig::Clip(config) => Ok(Arc::new(
                candle_clip_embedder::CandleClipEmbedder::new(&config.model, &config.revision)?,
            )),
            #[cfg(not(feature = "embeddings-multimodal"))]
            EmbedderConfig::Clip(_) => Err(crate::error::LensError::invalid_config(
                "the clip embedder requires building with the `embeddings-multimodal` feature",
            )),
        }
    }
}

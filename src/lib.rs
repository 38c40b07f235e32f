//! # Lens
//!
//! Image and text similarity search over precomputed vector indexes.
//!
//! A query image or text is embedded into a unit vector, searched against
//! the flat inner-product index of the requested mode, filtered by a
//! similarity threshold, and joined with catalog metadata.
//!
//! ## Features
//!
//! - One index and id map per mode (`color`, `structure`, `combined`)
//! - FAISS flat index files read directly
//! - Pluggable blob stores, metadata stores and embedding providers
//! - Chunked metadata lookup that tolerates partial failures
//! - axum HTTP server and a CLI

pub mod config;
pub mod embedding;
pub mod encoder;
pub mod error;
pub mod index;
pub mod metadata;
pub mod registry;
pub mod search;
pub mod server;
pub mod service;
pub mod storage;
pub mod vector;

// Re-exports for the public API
pub use config::LensConfig;
#[cfg(feature = "embeddings-multimodal")]
pub use embedding::candle_clip_embedder::CandleClipEmbedder;
pub use embedding::embedder::{EmbedInput, EmbedInputType, Embedder};
pub use embedding::http_embedder::HttpEmbedder;
pub use embedding::{EmbedderConfig, EmbedderFactory};
pub use encoder::{QueryEncoder, QueryInput};
pub use error::{FeatureErrorKind, LensError, Result};
pub use index::{FlatIndex, IdMap, Metric, Neighbor};
pub use metadata::{
    MetadataRecord, MetadataResolver, MetadataStore, MetadataStoreConfig, MetadataStoreFactory,
    Resolution,
};
pub use registry::{IndexKeys, IndexMode, IndexRegistry, ModeIndex, ModeState};
pub use search::{Candidate, SearchEngine};
pub use service::{SearchHit, SearchOutcome, SearchRequest, SearchRequestBuilder, SearchService};
pub use storage::{BlobStore, BlobStoreConfig, BlobStoreFactory};
pub use vector::Vector;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

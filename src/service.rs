//! Request handling: encode, search, resolve, merge.
//!
//! [`SearchService`] is the single entry point used by the HTTP server and
//! the CLI. It validates the requested mode before any model work, runs the
//! pipeline under an optional deadline, and returns hits sorted by score.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::LensConfig;
use crate::embedding::EmbedderFactory;
use crate::encoder::{QueryEncoder, QueryInput};
use crate::error::{LensError, Result};
use crate::metadata::{
    ChunkFailure, EntityId, MetadataRecord, MetadataResolver, MetadataStoreFactory,
};
use crate::registry::IndexRegistry;
use crate::search::{Candidate, SearchEngine};
use crate::storage::BlobStoreFactory;

pub const DEFAULT_MODE: &str = "color";
pub const DEFAULT_THRESHOLD: f32 = 0.75;
pub const DEFAULT_TOP_K: i64 = 20;

/// One search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: QueryInput,
    pub mode: String,
    pub threshold: f32,
    pub top_k: i64,
}

impl SearchRequest {
    pub fn new(query: QueryInput) -> Self {
        Self {
            query,
            mode: DEFAULT_MODE.to_string(),
            threshold: DEFAULT_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Builder for [`SearchRequest`].
pub struct SearchRequestBuilder {
    request: SearchRequest,
}

impl SearchRequestBuilder {
    pub fn new(query: QueryInput) -> Self {
        Self {
            request: SearchRequest::new(query),
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.request.mode = mode.into();
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.request.threshold = threshold;
        self
    }

    pub fn top_k(mut self, top_k: i64) -> Self {
        self.request.top_k = top_k;
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}

fn round4<S: Serializer>(score: &f32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let rounded = (f64::from(*score) * 10_000.0).round() / 10_000.0;
    serializer.serialize_f64(rounded)
}

/// A candidate joined with its catalog record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub image_id: String,
    pub image_path: String,
    #[serde(serialize_with = "round4")]
    pub score: f32,
    pub variant_id: Option<EntityId>,
    pub variant_name: Option<String>,
    pub model_number: Option<String>,
    pub product_id: Option<EntityId>,
    pub product_name: Option<String>,
    pub brand_id: Option<EntityId>,
    pub brand_name: Option<String>,
}

impl SearchHit {
    pub fn new(candidate: &Candidate, record: &MetadataRecord) -> Self {
        let variant = record.variant.as_ref();
        let product = record.product();
        let brand = record.brand();
        Self {
            image_id: candidate.id.clone(),
            image_path: record
                .image_url
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            score: candidate.score,
            variant_id: variant.and_then(|v| v.id.clone()),
            variant_name: variant.and_then(|v| v.name.clone()),
            model_number: variant.and_then(|v| v.model_number.clone()),
            product_id: product.and_then(|p| p.id.clone()),
            product_name: product.and_then(|p| p.name.clone()),
            brand_id: brand.and_then(|b| b.id.clone()),
            brand_name: brand.and_then(|b| b.name.clone()),
        }
    }
}

/// Join candidates with their records and sort by score, highest first.
///
/// Candidates without a record are dropped. Equal scores keep their
/// candidate order.
pub fn merge_results(
    candidates: &[Candidate],
    records: &HashMap<String, MetadataRecord>,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = candidates
        .iter()
        .filter_map(|candidate| {
            records
                .get(&candidate.id)
                .map(|record| SearchHit::new(candidate, record))
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits
}

/// Hits plus any metadata chunks that could not be fetched.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub failed_chunks: Vec<ChunkFailure>,
}

#[derive(Debug, Clone)]
pub struct SearchService {
    registry: Arc<IndexRegistry>,
    encoder: QueryEncoder,
    engine: SearchEngine,
    resolver: MetadataResolver,
    timeout: Option<Duration>,
}

impl SearchService {
    pub fn new(
        registry: Arc<IndexRegistry>,
        encoder: QueryEncoder,
        resolver: MetadataResolver,
    ) -> Self {
        Self {
            engine: SearchEngine::new(Arc::clone(&registry)),
            registry,
            encoder,
            resolver,
            timeout: None,
        }
    }

    /// Bound the whole encode, search and resolve pipeline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wire up stores, the embedder and the index registry from configuration.
    pub async fn from_config(config: &LensConfig) -> Result<Self> {
        let blob_store = BlobStoreFactory::create(config.blob_store.clone())?;
        log::info!(
            "Loading {} index modes from {} blob store",
            config.modes.len(),
            blob_store.name()
        );
        let registry =
            IndexRegistry::load(blob_store.as_ref(), &config.modes, &config.index_keys).await;
        if registry.loaded_count() == 0 {
            log::warn!("No index modes loaded; every search will fail");
        }

        let embedder_config = config.embedder.clone();
        let embedder = tokio::task::spawn_blocking(move || EmbedderFactory::create(embedder_config))
            .await
            .map_err(|e| LensError::internal(format!("embedder setup failed: {e}")))??;
        let encoder = QueryEncoder::new(embedder, config.server.max_concurrent_inference);

        let metadata_store = MetadataStoreFactory::create(config.metadata_store.clone()).await?;
        let resolver = MetadataResolver::new(metadata_store)
            .chunk_size(config.search.metadata_chunk_size)
            .concurrency(config.search.metadata_concurrency);

        let service = Self::new(Arc::new(registry), encoder, resolver);
        Ok(match config.server.request_timeout() {
            Some(timeout) => service.with_timeout(timeout),
            None => service,
        })
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn encoder(&self) -> &QueryEncoder {
        &self.encoder
    }

    /// Run one search under the configured deadline.
    ///
    /// Expiry drops the pipeline future. Work already handed to
    /// `spawn_blocking` (CLIP inference, the flat scan) cannot be cancelled
    /// and runs to completion in the background; its result is discarded.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(request))
                .await
                .map_err(|_| LensError::Timeout(limit))?,
            None => self.run(request).await,
        }
    }

    async fn run(&self, request: SearchRequest) -> Result<SearchOutcome> {
        let entry = self.registry.get(&request.mode)?;
        let query = self.encoder.encode(&request.query, entry.mode()).await?;

        let engine = self.engine.clone();
        let SearchRequest {
            mode,
            threshold,
            top_k,
            ..
        } = request;
        let candidates = tokio::task::spawn_blocking(move || {
            engine.search(&mode, &query, top_k, threshold)
        })
        .await
        .map_err(|e| LensError::internal(format!("search task failed: {e}")))??;

        let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
        let resolution = self.resolver.resolve(&ids).await;
        let hits = merge_results(&candidates, &resolution.resolved);

        log::debug!(
            "{} candidates, {} hits, {} failed metadata chunks",
            candidates.len(),
            hits.len(),
            resolution.failed_chunks.len()
        );

        Ok(SearchOutcome {
            hits,
            failed_chunks: resolution.failed_chunks,
        })
    }
}

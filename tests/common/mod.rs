#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use lens::embedding::embedder::{EmbedInput, EmbedInputType, Embedder};
use lens::error::Result;
use lens::index::builder::{IndexRecord, build_index};
use lens::index::faiss::flat_index_to_bytes;
use lens::metadata::memory::MemoryMetadataStore;
use lens::metadata::{Brand, EntityId, MetadataRecord, Product, Variant};
use lens::storage::memory::MemoryBlobStore;
use lens::vector::Vector;
use lens::{
    IndexKeys, IndexMode, IndexRegistry, MetadataResolver, QueryEncoder, SearchService,
};

pub const DIMENSION: usize = 16;

/// Deterministic embedder: the vector is a pseudo-random function of the
/// input bytes (text bytes or raw RGB pixels).
#[derive(Debug, Default)]
pub struct HashEmbedder {
    pub delay: Option<Duration>,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Raw (unnormalized) embedding for `bytes`.
pub fn hash_vector(bytes: &[u8]) -> Vec<f32> {
    let mut state = bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
    }) | 1;
    (0..DIMENSION)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as f32 / (1u64 << 24) as f32 - 0.5
        })
        .collect()
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, input: &EmbedInput<'_>) -> Result<Vector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let data = match input {
            EmbedInput::Text(text) => hash_vector(text.as_bytes()),
            EmbedInput::Image(image) => hash_vector(image.as_raw()),
        };
        Ok(Vector::new(data))
    }

    fn supported_input_types(&self) -> Vec<EmbedInputType> {
        vec![EmbedInputType::Text, EmbedInputType::Image]
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Store index artifacts for `mode` where slot `i` holds `hash_vector(payloads[i])`.
pub fn put_mode(store: &MemoryBlobStore, mode: &str, entries: &[(String, Vec<u8>)]) {
    let records = entries
        .iter()
        .map(|(id, payload)| IndexRecord {
            id: id.clone(),
            vector: hash_vector(payload),
        })
        .collect();
    let (index, id_map) = build_index(records).unwrap();
    let keys = IndexKeys::default();
    store.put(keys.index_key(mode), flat_index_to_bytes(&index).unwrap());
    store.put(keys.id_map_key(mode), id_map.to_json().unwrap());
}

/// Catalog entries `a0..a{n}` indexed by the text `item {i}`.
pub fn catalog(n: usize) -> Vec<(String, Vec<u8>)> {
    (0..n)
        .map(|i| (format!("a{i}"), format!("item {i}").into_bytes()))
        .collect()
}

pub fn record(id: &str) -> MetadataRecord {
    MetadataRecord::new(id)
        .with_image_url(format!("https://cdn.example.com/{id}.jpg"))
        .with_variant(Variant {
            id: Some(EntityId::Int(1)),
            name: Some(format!("variant of {id}")),
            model_number: Some("MN-1".to_string()),
            product: Some(Product {
                id: Some(EntityId::Int(2)),
                name: Some("Trail Runner".to_string()),
                brand: Some(Brand {
                    id: Some(EntityId::Int(3)),
                    name: Some("Acme".to_string()),
                }),
            }),
        })
}

pub fn png(image: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub struct Fixture {
    pub blobs: MemoryBlobStore,
    pub metadata: Arc<MemoryMetadataStore>,
    pub embedder: Arc<HashEmbedder>,
}

impl Fixture {
    /// `color` mode over `catalog(n)` with metadata for every id.
    pub fn new(n: usize) -> Self {
        let blobs = MemoryBlobStore::default();
        put_mode(&blobs, "color", &catalog(n));
        let metadata = Arc::new(MemoryMetadataStore::new(
            (0..n).map(|i| record(&format!("a{i}"))),
        ));
        Self {
            blobs,
            metadata,
            embedder: Arc::new(HashEmbedder::default()),
        }
    }

    pub async fn registry(&self) -> IndexRegistry {
        IndexRegistry::load(&self.blobs, &IndexMode::defaults(), &IndexKeys::default()).await
    }

    pub async fn service(&self) -> SearchService {
        let registry = self.registry().await;
        SearchService::new(
            Arc::new(registry),
            QueryEncoder::new(self.embedder.clone(), 2),
            MetadataResolver::new(self.metadata.clone()),
        )
    }
}

//! Chunked metadata resolution with partial-failure semantics.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::LensError;
use crate::metadata::{MetadataRecord, MetadataStore};

/// Batch size for one store lookup.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// A batch that could not be fetched.
#[derive(Debug)]
pub struct ChunkFailure {
    pub ids: Vec<String>,
    pub cause: LensError,
}

/// Records found across all chunks plus the chunks that failed.
#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: HashMap<String, MetadataRecord>,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl Resolution {
    pub fn get(&self, id: &str) -> Option<&MetadataRecord> {
        self.resolved.get(id)
    }

    pub fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MetadataResolver {
    store: Arc<dyn MetadataStore>,
    chunk_size: usize,
    concurrency: usize,
}

impl MetadataResolver {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 1,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Maximum number of chunk lookups in flight. 1 fetches sequentially.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Look up `ids` in chunks.
    ///
    /// Ids without a record are absent from the result. A failed chunk is
    /// logged and recorded in [`Resolution::failed_chunks`]; the remaining
    /// chunks are still fetched. An empty input issues no store call.
    pub async fn resolve(&self, ids: &[String]) -> Resolution {
        let mut resolution = Resolution::default();
        if ids.is_empty() {
            return resolution;
        }

        let chunks: Vec<Vec<String>> = ids
            .chunks(self.chunk_size)
            .map(<[String]>::to_vec)
            .collect();
        let mut lookups = stream::iter(chunks)
            .map(|chunk| {
                let store = Arc::clone(&self.store);
                async move {
                    let outcome = store.fetch(&chunk).await;
                    (chunk, outcome)
                }
            })
            .buffered(self.concurrency);

        while let Some((chunk, outcome)) = lookups.next().await {
            match outcome {
                Ok(records) => {
                    for record in records {
                        resolution.resolved.insert(record.key(), record);
                    }
                }
                Err(cause) => {
                    log::error!(
                        "Metadata fetch from {} failed for a chunk of {} ids: {cause}",
                        self.store.name(),
                        chunk.len()
                    );
                    resolution.failed_chunks.push(ChunkFailure {
                        ids: chunk,
                        cause,
                    });
                }
            }
        }

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::memory::MemoryMetadataStore;

    fn ids(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("id{i}")).collect()
    }

    fn store_with(range: std::ops::Range<usize>) -> Arc<MemoryMetadataStore> {
        Arc::new(MemoryMetadataStore::new(
            range.map(|i| MetadataRecord::new(format!("id{i}").as_str())),
        ))
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let store = store_with(0..10);
        let resolver = MetadataResolver::new(store.clone());
        let resolution = resolver.resolve(&[]).await;
        assert!(resolution.resolved.is_empty());
        assert!(resolution.is_complete());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_chunks_of_fifty() {
        let store = store_with(0..120);
        let resolver = MetadataResolver::new(store.clone());
        let resolution = resolver.resolve(&ids(0..120)).await;
        assert_eq!(store.calls(), 3);
        assert_eq!(resolution.resolved.len(), 120);
    }

    #[tokio::test]
    async fn test_missing_ids_are_absent() {
        let store = store_with(0..5);
        let resolver = MetadataResolver::new(store);
        let resolution = resolver.resolve(&ids(3..8)).await;
        assert_eq!(resolution.resolved.len(), 2);
        assert!(resolution.get("id4").is_some());
        assert!(resolution.get("id5").is_none());
        assert!(resolution.is_complete());
    }

    #[tokio::test]
    async fn test_failed_chunk_does_not_abort() {
        let store = store_with(0..30);
        store.fail_on("id12");
        let resolver = MetadataResolver::new(store.clone()).chunk_size(10);

        let resolution = resolver.resolve(&ids(0..30)).await;
        assert_eq!(store.calls(), 3);
        assert_eq!(resolution.resolved.len(), 20);
        assert!(resolution.get("id5").is_some());
        assert!(resolution.get("id12").is_none());
        assert!(resolution.get("id25").is_some());

        assert_eq!(resolution.failed_chunks.len(), 1);
        assert_eq!(resolution.failed_chunks[0].ids, ids(10..20));
        assert!(matches!(
            resolution.failed_chunks[0].cause,
            LensError::Metadata(_)
        ));
    }

    #[tokio::test]
    async fn test_resolve_runs_on_spawned_task() {
        let store = store_with(0..60);
        let resolver = MetadataResolver::new(store.clone()).concurrency(2);
        let resolution = tokio::spawn(async move { resolver.resolve(&ids(0..60)).await })
            .await
            .unwrap();
        assert_eq!(resolution.resolved.len(), 60);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_chunks_match_sequential() {
        let store = store_with(0..200);
        store.fail_on("id77");
        let sequential = MetadataResolver::new(store.clone())
            .chunk_size(25)
            .resolve(&ids(0..200))
            .await;
        let concurrent = MetadataResolver::new(store.clone())
            .chunk_size(25)
            .concurrency(4)
            .resolve(&ids(0..200))
            .await;
        assert_eq!(sequential.resolved, concurrent.resolved);
        assert_eq!(
            sequential.failed_chunks[0].ids,
            concurrent.failed_chunks[0].ids
        );
    }
}

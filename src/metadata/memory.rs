//! In-memory metadata store.
//!
//! Backs the `json` store type and the test suites. Individual ids can be
//! marked as failing so that any batch containing them returns an error.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{LensError, Result};
use crate::metadata::{MetadataRecord, MetadataStore};

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: RwLock<HashMap<String, MetadataRecord>>,
    failing: RwLock<HashSet<String>>,
    calls: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        let store = Self::default();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Load a JSON array of records.
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            LensError::metadata(format!("failed to read {}: {e}", path.display()))
        })?;
        let records: Vec<MetadataRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            LensError::metadata(format!("invalid metadata file {}: {e}", path.display()))
        })?;
        log::info!(
            "Loaded {} metadata records from {}",
            records.len(),
            path.display()
        );
        Ok(Self::new(records))
    }

    pub fn insert(&self, record: MetadataRecord) {
        self.records.write().insert(record.key(), record);
    }

    pub fn remove(&self, id: &str) -> Option<MetadataRecord> {
        self.records.write().remove(id)
    }

    /// Make every batch that contains `id` fail.
    pub fn fail_on(&self, id: impl Into<String>) {
        self.failing.write().insert(id.into());
    }

    /// Number of `fetch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<MetadataRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let failing = self.failing.read();
            if let Some(bad) = ids.iter().find(|id| failing.contains(*id)) {
                return Err(LensError::metadata(format!("lookup failed for id '{bad}'")));
            }
        }

        let records = self.records.read();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| records.get(id).cloned())
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_known_ids_only() {
        let store = MemoryMetadataStore::new([
            MetadataRecord::new("a"),
            MetadataRecord::new("b"),
        ]);
        let ids = vec!["b".to_string(), "missing".to_string(), "b".to_string()];
        let records = store.fetch(&ids).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "b");
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_id_fails_batch() {
        let store = MemoryMetadataStore::new([MetadataRecord::new("a")]);
        store.fail_on("boom");
        let err = store
            .fetch(&["a".to_string(), "boom".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, LensError::Metadata(_)));
    }

    #[tokio::test]
    async fn test_load_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 1, "image_url": "u1"}}, {{"id": "x", "product_variants": null}}]"#
        )
        .unwrap();
        let store = MemoryMetadataStore::from_json_file(file.path())
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.remove("1").is_some());
    }

    #[tokio::test]
    async fn test_load_missing_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = MemoryMetadataStore::from_json_file(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, LensError::Metadata(_)));
    }
}

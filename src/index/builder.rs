//! Build index artifacts from raw `(id, vector)` records.
//!
//! Produces the same pair of files the service loads: a FAISS flat
//! inner-product index and a slot-aligned id map. Vectors are scaled to
//! unit length on the way in.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LensError, Result};
use crate::index::faiss::flat_index_to_bytes;
use crate::index::{FlatIndex, IdMap, Metric};
use crate::registry::IndexKeys;
use crate::vector::Vector;

#[derive(Debug, Clone, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
}

/// Normalize and append `records` in order.
pub fn build_index(records: Vec<IndexRecord>) -> Result<(FlatIndex, IdMap)> {
    let dimension = records
        .first()
        .map(|record| record.vector.len())
        .ok_or_else(|| LensError::invalid_argument("no vectors to index"))?;

    let mut index = FlatIndex::new(dimension, Metric::InnerProduct)?;
    let mut ids = Vec::with_capacity(records.len());
    for IndexRecord { id, vector } in records {
        let mut vector = Vector::new(vector);
        if !vector.is_valid() || !vector.normalize() {
            return Err(LensError::invalid_argument(format!(
                "vector for '{id}' has zero length or non-finite values"
            )));
        }
        index
            .add(vector.as_slice())
            .map_err(|e| LensError::invalid_argument(format!("'{id}': {e}")))?;
        ids.push(id);
    }

    Ok((index, IdMap::new(ids)))
}

/// Write both artifacts for `mode` under `dir`; returns their paths.
pub fn write_artifacts(
    dir: &Path,
    mode: &str,
    keys: &IndexKeys,
    index: &FlatIndex,
    id_map: &IdMap,
) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let index_path = dir.join(keys.index_key(mode));
    let id_map_path = dir.join(keys.id_map_key(mode));
    std::fs::write(&index_path, flat_index_to_bytes(index)?)?;
    std::fs::write(&id_map_path, id_map.to_json()?)?;
    Ok((index_path, id_map_path))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::index::faiss::read_flat_index;

    fn record(id: &str, vector: &[f32]) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            vector: vector.to_vec(),
        }
    }

    #[test]
    fn test_build_normalizes() {
        let (index, id_map) =
            build_index(vec![record("a", &[3.0, 4.0]), record("b", &[0.0, 2.0])]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(id_map.get(1), Some("b"));
        let first = index.vector(0).unwrap();
        assert!((first[0] - 0.6).abs() < 1e-6);
        assert!((first[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(build_index(Vec::new()).is_err());
        assert!(build_index(vec![record("z", &[0.0, 0.0])]).is_err());
        assert!(build_index(vec![record("a", &[1.0, 0.0]), record("b", &[1.0])]).is_err());
    }

    #[test]
    fn test_write_artifacts() {
        let dir = TempDir::new().unwrap();
        let (index, id_map) = build_index(vec![record("a", &[1.0, 1.0])]).unwrap();
        let (index_path, id_map_path) =
            write_artifacts(dir.path(), "color", &IndexKeys::default(), &index, &id_map).unwrap();

        assert!(index_path.ends_with("color.index"));
        let reread = read_flat_index(&std::fs::read(index_path).unwrap()).unwrap();
        assert_eq!(reread.len(), 1);
        let ids = IdMap::from_json(&std::fs::read(id_map_path).unwrap()).unwrap();
        assert_eq!(ids, id_map);
    }
}

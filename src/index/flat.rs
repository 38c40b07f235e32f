//! Flat (brute force) vector index.
//!
//! The index stores every vector in a single row-major buffer and scores a
//! query against all of them. Results mirror FAISS: exactly `k` neighbors
//! are returned, padded with [`Neighbor::SENTINEL_SLOT`] when the index holds
//! fewer than `k` vectors.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::error::{LensError, Result};
use crate::vector::inner_product;

/// Similarity metric the stored vectors were indexed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Inner product; higher is closer.
    InnerProduct,
    /// Squared Euclidean distance; lower is closer.
    L2,
}

/// One raw k-NN result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub slot: i64,
    pub score: f32,
}

impl Neighbor {
    /// Slot reported for "no match" padding entries.
    pub const SENTINEL_SLOT: i64 = -1;

    const SENTINEL: Self = Self {
        slot: Self::SENTINEL_SLOT,
        score: f32::NEG_INFINITY,
    };
}

/// Exact index over `len()` vectors of `dimension()` floats.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(dimension: usize, metric: Metric) -> Result<Self> {
        if dimension == 0 {
            return Err(LensError::index("index dimension must be greater than zero"));
        }
        Ok(Self {
            dimension,
            metric,
            data: Vec::new(),
        })
    }

    /// Build an index from a row-major buffer of `data.len() / dimension` vectors.
    pub fn from_raw(dimension: usize, metric: Metric, data: Vec<f32>) -> Result<Self> {
        let mut index = Self::new(dimension, metric)?;
        if data.len() % dimension != 0 {
            return Err(LensError::index(format!(
                "vector buffer of {} floats is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        index.data = data;
        Ok(index)
    }

    /// Append one vector.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(LensError::invalid_argument(format!(
                "vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major view of all stored vectors.
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    /// Stored vector at `slot`, if any.
    pub fn vector(&self, slot: usize) -> Option<&[f32]> {
        let start = slot.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` slots with the highest inner product against `query`.
    ///
    /// The query is scored as given; no normalization happens here. L2
    /// indexes can be loaded and inspected but not searched.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.metric != Metric::InnerProduct {
            return Err(LensError::index("only inner product indexes can be searched"));
        }
        if query.len() != self.dimension {
            return Err(LensError::index(format!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(slot, row)| Neighbor {
                slot: slot as i64,
                score: inner_product(query, row),
            })
            .collect();

        let closer_first = |a: &Neighbor, b: &Neighbor| -> Ordering { b.score.total_cmp(&a.score) };

        if scored.len() > k {
            scored.select_nth_unstable_by(k - 1, closer_first);
            scored.truncate(k);
        }
        scored.sort_by(closer_first);
        scored.resize(k, Neighbor::SENTINEL);

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_index() -> FlatIndex {
        let mut index = FlatIndex::new(3, Metric::InnerProduct).unwrap();
        index.add(&[1.0, 0.0, 0.0]).unwrap();
        index.add(&[0.0, 1.0, 0.0]).unwrap();
        index.add(&[0.0, 0.0, 1.0]).unwrap();
        index
    }

    #[test]
    fn test_flat_index_search() {
        let index = create_test_index();
        let hits = index.search(&[0.0, 1.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].slot, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_index_pads_with_sentinel() {
        let index = create_test_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[3].slot, Neighbor::SENTINEL_SLOT);
        assert_eq!(hits[4].slot, Neighbor::SENTINEL_SLOT);
        assert_eq!(hits[4].score, f32::NEG_INFINITY);
    }

    #[test]
    fn test_flat_index_zero_k() {
        let index = create_test_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_flat_index_dimension_mismatch() {
        let index = create_test_index();
        let err = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, LensError::Index(_)));
        assert!(FlatIndex::from_raw(3, Metric::InnerProduct, vec![0.0; 4]).is_err());
    }

    #[test]
    fn test_flat_index_l2_is_not_searchable() {
        let index = FlatIndex::from_raw(2, Metric::L2, vec![0.0, 0.0, 5.0, 5.0]).unwrap();
        assert_eq!(index.len(), 2);
        assert!(matches!(
            index.search(&[4.0, 4.0], 2).unwrap_err(),
            LensError::Index(_)
        ));
    }
}

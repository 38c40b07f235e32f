//! Threshold-filtered nearest-neighbor search over a registered mode.
//!
//! Search runs in two explicit steps: a raw k-NN lookup against the mode's
//! [`FlatIndex`](crate::index::FlatIndex), then [`select_candidates`] which
//! maps slots to ids and applies the similarity threshold. Raw index output
//! is treated as unordered.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::{IdMap, Neighbor};
use crate::registry::IndexRegistry;
use crate::vector::Vector;

/// A scored id produced by one search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub score: f32,
}

impl Candidate {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchEngine {
    registry: Arc<IndexRegistry>,
}

impl SearchEngine {
    pub fn new(registry: Arc<IndexRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    /// Return up to `top_k` candidates from `mode` scoring at least `threshold`.
    ///
    /// `query` must already be unit length. `top_k <= 0` yields an empty
    /// result. Thresholds outside `[-1, 1]` are accepted and simply filter
    /// everything or nothing.
    pub fn search(
        &self,
        mode: &str,
        query: &Vector,
        top_k: i64,
        threshold: f32,
    ) -> Result<Vec<Candidate>> {
        let entry = self.registry.get(mode)?;
        if top_k <= 0 {
            return Ok(Vec::new());
        }

        // Asking for more than the index holds only adds sentinel padding.
        let k = usize::try_from(top_k)
            .unwrap_or(usize::MAX)
            .min(entry.index().len());
        let raw = entry.index().search(query.as_slice(), k)?;

        let candidates = select_candidates(&raw, entry.id_map(), threshold);
        log::debug!(
            "mode '{mode}': {} raw neighbors, {} above threshold {threshold}",
            raw.len(),
            candidates.len()
        );
        Ok(candidates)
    }
}

/// Map raw neighbors to ids and keep those with `score >= threshold`.
///
/// Slots the id map cannot resolve (including the `-1` sentinel) are
/// dropped. Duplicate ids are passed through. Input order is preserved.
pub fn select_candidates(raw: &[Neighbor], id_map: &IdMap, threshold: f32) -> Vec<Candidate> {
    raw.iter()
        .filter_map(|neighbor| {
            let id = id_map.get(neighbor.slot)?;
            (neighbor.score >= threshold).then(|| Candidate::new(id, neighbor.score))
        })
        .collect()
}

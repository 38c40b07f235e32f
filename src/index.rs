//! Approximate nearest neighbor index structures.
//!
//! # Module Structure
//!
//! - `flat`: exact inner-product index over a dense row-major matrix
//! - `faiss`: reader/writer for the FAISS flat index file format
//! - `id_map`: slot-aligned external identifiers
//! - `builder`: index artifacts from raw `(id, vector)` records

pub mod builder;
pub mod faiss;
pub mod flat;
pub mod id_map;

pub use flat::{FlatIndex, Metric, Neighbor};
pub use id_map::IdMap;

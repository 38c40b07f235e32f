//! Dense query vectors and the inner-product kernel shared by the index.

use serde::{Deserialize, Serialize};
use wide::f32x8;

/// Tolerance used when checking that a vector is unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-5;

/// A dense embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub data: Vec<f32>,
}

impl Vector {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Euclidean length.
    pub fn norm(&self) -> f32 {
        inner_product(&self.data, &self.data).sqrt()
    }

    /// Whether every component is finite.
    pub fn is_valid(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn is_unit(&self) -> bool {
        (self.norm() - 1.0).abs() < UNIT_NORM_TOLERANCE
    }

    /// Scale to unit length in place. Returns `false` (leaving the data
    /// untouched) when the vector has zero or non-finite length.
    pub fn normalize(&mut self) -> bool {
        let norm = self.norm();
        if norm == 0.0 || !norm.is_finite() {
            return false;
        }
        for value in &mut self.data {
            *value /= norm;
        }
        true
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Inner product of two equal-length slices, eight lanes at a time.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let a_chunks = a.chunks_exact(8);
    let b_chunks = b.chunks_exact(8);
    let a_rem = a_chunks.remainder();
    let b_rem = b_chunks.remainder();

    let mut acc = f32x8::ZERO;
    let mut lane_a = [0.0f32; 8];
    let mut lane_b = [0.0f32; 8];
    for (ca, cb) in a_chunks.zip(b_chunks) {
        lane_a.copy_from_slice(ca);
        lane_b.copy_from_slice(cb);
        acc = f32x8::new(lane_a).mul_add(f32x8::new(lane_b), acc);
    }

    let mut sum = acc.reduce_add();
    for (x, y) in a_rem.iter().zip(b_rem) {
        sum += x * y;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_product_matches_naive() {
        let a: Vec<f32> = (0..19).map(|i| i as f32 * 0.5).collect();
        let b: Vec<f32> = (0..19).map(|i| 1.0 - i as f32 * 0.1).collect();
        let naive: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((inner_product(&a, &b) - naive).abs() < 1e-3);
    }

    #[test]
    fn test_normalize() {
        let mut v = Vector::new(vec![3.0, 4.0]);
        assert!(v.normalize());
        assert!(v.is_unit());
        assert!((v.data[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = Vector::new(vec![0.0; 4]);
        assert!(!v.normalize());
        assert_eq!(v.data, vec![0.0; 4]);
    }
}

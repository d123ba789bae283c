//! Sparse feature vectors.

use serde::{Deserialize, Serialize};

/// A sparse row of the document-term matrix, with indices in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(index, value)` pairs. Pairs are sorted and zero values dropped;
    /// duplicate indices are summed.
    pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> Self {
        pairs.sort_unstable_by_key(|&(index, _)| index);

        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (index, value) in pairs {
            if indices.last() == Some(&index) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(index);
                values.push(value);
            }
        }

        let mut vector = SparseVector { indices, values };
        vector.retain_non_zero();
        vector
    }

    fn retain_non_zero(&mut self) {
        let mut keep = 0;
        for i in 0..self.indices.len() {
            if self.values[i] != 0.0 {
                self.indices[keep] = self.indices[i];
                self.values[keep] = self.values[i];
                keep += 1;
            }
        }
        self.indices.truncate(keep);
        self.values.truncate(keep);
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at `index`, zero when absent.
    pub fn get(&self, index: usize) -> f64 {
        self.indices
            .binary_search(&index)
            .map_or(0.0, |pos| self.values[pos])
    }

    /// Largest stored index plus one.
    pub fn dimension_hint(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// Scale to unit Euclidean length. A zero vector is left unchanged.
    pub fn l2_normalize(&mut self) {
        let norm = self.squared_norm().sqrt();
        if norm > 0.0 {
            for value in &mut self.values {
                *value /= norm;
            }
        }
    }

    /// Dot product with a dense vector. Indices beyond `dense` count as zero.
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.iter()
            .filter_map(|(i, v)| dense.get(i).map(|w| w * v))
            .sum()
    }

    /// `dense += scale * self`, ignoring indices beyond `dense`.
    pub fn add_scaled_to(&self, dense: &mut [f64], scale: f64) {
        for (i, v) in self.iter() {
            if let Some(w) = dense.get_mut(i) {
                *w += scale * v;
            }
        }
    }
}

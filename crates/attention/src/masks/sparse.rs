//! Sparse `(query, key)` masks given as coordinate/value pairs.
//!
//! Unlisted coordinates are masked out; listed coordinates keep the pair iff
//! their value is nonzero. A later duplicate coordinate overrides an earlier
//! one.

use candle_core::{Device, Tensor};

use crate::core::{AttentionError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SparseMask {
    indices: Vec<[usize; 2]>,
    values: Vec<f32>,
    dense_shape: (usize, usize),
}

impl SparseMask {
    /// Validates that every index lies inside `dense_shape = (q_len, k_len)`.
    pub fn new(
        indices: Vec<[usize; 2]>,
        values: Vec<f32>,
        dense_shape: (usize, usize),
    ) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(AttentionError::mask_shape(format!(
                "sparse mask has {} indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        let (rows, cols) = dense_shape;
        if let Some([q, k]) = indices.iter().find(|[q, k]| *q >= rows || *k >= cols) {
            return Err(AttentionError::mask_shape(format!(
                "sparse index [{q}, {k}] outside dense shape ({rows}, {cols})"
            )));
        }
        Ok(Self {
            indices,
            values,
            dense_shape,
        })
    }

    /// Keeps exactly the listed `(query, key)` pairs.
    pub fn from_pairs(pairs: Vec<[usize; 2]>, dense_shape: (usize, usize)) -> Result<Self> {
        let values = vec![1.0; pairs.len()];
        Self::new(pairs, values, dense_shape)
    }

    pub fn dense_shape(&self) -> (usize, usize) {
        self.dense_shape
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Densifies into a `[q_len, k_len]` keep-mask.
    pub fn densify(&self, device: &Device) -> Result<Tensor> {
        let (rows, cols) = self.dense_shape;
        let mut data = vec![0f32; rows * cols];
        for ([q, k], &value) in self.indices.iter().zip(self.values.iter()) {
            data[q * cols + k] = if value != 0.0 { 1.0 } else { 0.0 };
        }
        Ok(Tensor::from_vec(data, (rows, cols), device)?)
    }

    /// Densifies and lifts to `[1, 1, q_len, k_len]` after checking the lengths.
    pub fn to_keep_mask(&self, device: &Device, q_len: usize, k_len: usize) -> Result<Tensor> {
        if self.dense_shape != (q_len, k_len) {
            return Err(AttentionError::mask_shape(format!(
                "sparse mask dense shape {:?} does not match (q_len, k_len) = ({q_len}, {k_len})",
                self.dense_shape
            )));
        }
        Ok(self.densify(device)?.reshape((1, 1, q_len, k_len))?)
    }
}

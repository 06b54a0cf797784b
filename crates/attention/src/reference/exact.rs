//! Reference scaled dot-product attention kernel.
//!
//! The exact path prioritises numerical fidelity and mirrors the semantics
//! described by the [`Attention`](crate::core::Attention) trait. All heads are
//! processed in one batched matmul; there is no per-head loop.

use candle_core::{DType, Tensor};
use layers::Dropout;
use rand::rngs::StdRng;

use crate::core::{Attention, AttentionError, AttentionOutput, Result};
use crate::masks::masked_softmax;

/// Numerically stable, portable attention kernel.
#[derive(Debug, Clone)]
pub struct ExactAttention {
    dropout: Dropout,
}

impl ExactAttention {
    /// Kernel without dropout.
    pub fn new() -> Self {
        Self {
            dropout: Dropout::disabled(),
        }
    }

    /// Kernel applying `dropout` to the weights in training mode.
    pub fn with_dropout(dropout: Dropout) -> Self {
        Self { dropout }
    }

    pub fn dropout(&self) -> &Dropout {
        &self.dropout
    }
}

impl Default for ExactAttention {
    fn default() -> Self {
        Self::new()
    }
}

fn check_float(t: &Tensor) -> Result<()> {
    if matches!(t.dtype(), DType::F32 | DType::F16 | DType::BF16) {
        Ok(())
    } else {
        Err(AttentionError::UnsupportedDType {
            requested: format!("{:?}", t.dtype()),
        })
    }
}

fn to_f32(t: &Tensor) -> Result<Tensor> {
    if t.dtype() == DType::F32 {
        Ok(t.clone())
    } else {
        Ok(t.to_dtype(DType::F32)?)
    }
}

impl Attention for ExactAttention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        keep: Option<&Tensor>,
        rng: Option<&mut StdRng>,
    ) -> Result<AttentionOutput> {
        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(AttentionError::shape(
                "q, k, v must reside on the same device",
            ));
        }

        let dtype = q.dtype();
        if dtype != k.dtype() || dtype != v.dtype() {
            return Err(AttentionError::shape("q, k, v must share the same dtype"));
        }
        check_float(q)?;

        let (batch, heads, q_len, head_dim) = q.dims4().map_err(|_| {
            AttentionError::shape("q must have shape [batch, heads, q_len, head_dim]")
        })?;
        let (kb, kh, k_len, kd) = k.dims4().map_err(|_| {
            AttentionError::shape("k must have shape [batch, heads, k_len, head_dim]")
        })?;
        let (vb, vh, vk, v_dim) = v.dims4().map_err(|_| {
            AttentionError::shape("v must have shape [batch, heads, k_len, v_dim]")
        })?;

        if kb != batch || kh != heads || kd != head_dim {
            return Err(AttentionError::shape(format!(
                "k shape mismatch: expected [{batch}, {heads}, ?, {head_dim}] got [{kb}, {kh}, {k_len}, {kd}]"
            )));
        }
        if vb != batch || vh != heads || vk != k_len {
            return Err(AttentionError::shape(format!(
                "v shape mismatch: expected [{batch}, {heads}, {k_len}, ?] got [{vb}, {vh}, {vk}, {v_dim}]"
            )));
        }

        let merged = batch * heads;
        let q_view = to_f32(q)?.reshape((merged, q_len, head_dim))?;
        let k_view = to_f32(k)?.reshape((merged, k_len, head_dim))?;
        let v_view = to_f32(v)?.reshape((merged, k_len, v_dim))?;

        let scale = 1.0 / (head_dim as f64).sqrt();
        let scores = q_view
            .matmul(&k_view.transpose(1, 2)?)?
            .affine(scale, 0.0)?
            .reshape((batch, heads, q_len, k_len))?;

        let weights = masked_softmax(&scores, keep)?;
        let dropped = self.dropout.forward(&weights, rng)?;

        let output = dropped
            .reshape((merged, q_len, k_len))?
            .matmul(&v_view)?
            .reshape((batch, heads, q_len, v_dim))?
            .to_dtype(dtype)?;

        Ok(AttentionOutput { output, weights })
    }
}

//! Core traits and types shared across attention implementations.
//!
//! Kernels operate on tensors with layout `[batch, n_heads, seq_len, head_dim]`.
//! Reductions accumulate in `f32` regardless of the incoming dtype (`bf16`,
//! `f16`, or `f32`); the output mirrors the dtype of the queries while the
//! attention weights stay in `f32`.

pub mod config;
pub mod context;
pub mod errors;

use candle_core::Tensor;
use rand::rngs::StdRng;

pub use config::AttentionConfig;
pub use context::ExecutionContext;
pub use errors::{AttentionError, Result};

/// Attended values together with the probabilities that produced them.
#[derive(Debug, Clone)]
pub struct AttentionOutput {
    /// Aggregated values; shape depends on the producer.
    pub output: Tensor,
    /// Per-head distribution over keys, `[batch, heads, q_len, k_len]`.
    pub weights: Tensor,
}

impl AttentionOutput {
    pub fn into_parts(self) -> (Tensor, Tensor) {
        (self.output, self.weights)
    }
}

/// Unified interface for attention kernels.
///
/// * `q` and `k` share the layout `[batch, n_heads, seq_len, head_dim]`.
/// * `v` is `[batch, n_heads, k_len, v_dim]`.
/// * `keep`, when present, is broadcastable to `[batch, n_heads, q_len, k_len]`
///   with nonzero entries marking positions that may be attended.
/// * `rng` selects training mode; `None` runs inference and skips dropout.
pub trait Attention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        keep: Option<&Tensor>,
        rng: Option<&mut StdRng>,
    ) -> Result<AttentionOutput>;
}

//! Multi-head scaled dot-product attention for the transformer project.
//!
//! [`MultiHeadAttention`] projects raw `[batch, seq, feature]` queries, keys
//! and values to `model_dim`, splits them into heads laid out
//! `[batch, n_heads, seq_len, head_dim]`, runs the [`ExactAttention`] kernel
//! under the effective mask and merges the heads back. Every call returns the
//! output together with the attention weights `[batch, n_heads, q_len, k_len]`.
//!
//! Masks come from two places: the construction-time causal flag and the
//! call-time [`AttentionMask`] (lengths, padding, dense or sparse). They are
//! combined with a logical AND and applied with a finite sentinel before the
//! softmax; rows left without any valid key fall back to a uniform
//! distribution over all keys. That fallback also covers keys the causal mask
//! would hide, so an empty padding row under `causal_mask` attends to future
//! positions.
//!
//! Dropout on the attention weights is a train-only concern: use
//! [`MultiHeadAttention::forward_train`] with a seeded RNG, or
//! [`MultiHeadAttention::forward`] for deterministic inference.

pub mod core;
pub mod heads;
pub mod masks;
pub mod multi_head;
pub mod reference;

pub use crate::core::{
    Attention, AttentionConfig, AttentionError, AttentionOutput, ExecutionContext,
};
pub use masks::{AttentionMask, SparseMask};
pub use multi_head::{MultiHeadAttention, Projections};
pub use reference::ExactAttention;

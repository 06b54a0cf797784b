//! Reshaping between the model layout and the per-head layout.
//!
//! `split_heads` reinterprets the last axis of `[batch, seq, model_dim]` as
//! `num_heads` contiguous blocks and moves the head axis next to batch:
//! `split[b, h, s, d] == x[b, s, h * head_dim + d]`. `merge_heads` is the exact
//! inverse. Both keep every axis explicit, so singleton heads or sequences
//! survive the round trip.

use candle_core::Tensor;

use crate::core::{AttentionError, Result};

/// `[batch, seq, model_dim]` -> `[batch, num_heads, seq, head_dim]`.
pub fn split_heads(x: &Tensor, num_heads: usize) -> Result<Tensor> {
    let (batch, seq, model_dim) = x.dims3().map_err(|_| {
        AttentionError::shape(format!(
            "split_heads expects [batch, seq, model_dim], got {:?}",
            x.dims()
        ))
    })?;
    if num_heads == 0 || model_dim % num_heads != 0 {
        return Err(AttentionError::shape(format!(
            "model_dim {model_dim} is not divisible into {num_heads} heads"
        )));
    }
    let head_dim = model_dim / num_heads;
    let split = x
        .reshape((batch, seq, num_heads, head_dim))?
        .transpose(1, 2)?
        .contiguous()?;
    Ok(split)
}

/// `[batch, num_heads, seq, head_dim]` -> `[batch, seq, num_heads * head_dim]`.
pub fn merge_heads(x: &Tensor) -> Result<Tensor> {
    let (batch, heads, seq, head_dim) = x.dims4().map_err(|_| {
        AttentionError::shape(format!(
            "merge_heads expects [batch, heads, seq, head_dim], got {:?}",
            x.dims()
        ))
    })?;
    let merged = x
        .transpose(1, 2)?
        .contiguous()?
        .reshape((batch, seq, heads * head_dim))?;
    Ok(merged)
}

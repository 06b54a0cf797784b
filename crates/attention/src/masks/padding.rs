//! Builders for padding masks used to drop padded keys.
//!
//! Padding masks share the dtype described in [`super::MASK_DTYPE`] and the
//! compact layout `[batch, 1, 1, k_len]`, which broadcasts over heads and
//! query positions.

use candle_core::{DType, Device, Tensor};

use super::MASK_DTYPE;
use crate::core::{AttentionError, Result};

/// Construct padding masks from per-batch valid key lengths.
///
/// Key `k` of example `b` stays visible iff `k < lengths[b]`; lengths past
/// `k_len` simply keep every key.
pub fn padding_mask_from_lengths(
    device: &Device,
    lengths: &[usize],
    k_len: usize,
) -> Result<Tensor> {
    let batch = lengths.len();
    let data: Vec<f32> = lengths
        .iter()
        .flat_map(|&valid| (0..k_len).map(move |k| if k < valid { 1.0 } else { 0.0 }))
        .collect();
    Ok(Tensor::from_vec(data, (batch, 1, 1, k_len), device)?)
}

/// Construct padding masks from per-example validity flags (`true` = valid).
pub fn padding_mask_from_flags(device: &Device, valid: &[Vec<bool>]) -> Result<Tensor> {
    let k_len = valid.first().map_or(0, Vec::len);
    if let Some(row) = valid.iter().find(|row| row.len() != k_len) {
        return Err(AttentionError::mask_shape(format!(
            "all padding rows must share k_len {k_len}, found a row of {}",
            row.len()
        )));
    }
    let data: Vec<f32> = valid
        .iter()
        .flatten()
        .map(|&keep| if keep { 1.0 } else { 0.0 })
        .collect();
    Ok(Tensor::from_vec(data, (valid.len(), 1, 1, k_len), device)?)
}

/// Normalise a `[batch, k_len]` tensor of any numeric dtype (nonzero = valid).
///
/// A leading dimension of 1 is accepted and broadcast over the batch.
pub fn padding_mask_from_tensor(mask: &Tensor, batch: usize, k_len: usize) -> Result<Tensor> {
    let (mb, mk) = mask.dims2().map_err(|_| {
        AttentionError::mask_shape(format!(
            "padding mask must be [batch, k_len], got {:?}",
            mask.dims()
        ))
    })?;
    if mk != k_len {
        return Err(AttentionError::mask_shape(format!(
            "padding mask covers {mk} keys but attention has k_len {k_len}"
        )));
    }
    if mb != batch && mb != 1 {
        return Err(AttentionError::mask_shape(format!(
            "padding mask batch {mb} does not match batch {batch}"
        )));
    }
    let keep = nonzero(mask)?;
    Ok(keep.reshape((mb, 1, 1, mk))?)
}

/// Maps any numeric tensor to `MASK_DTYPE` with 1.0 where the input is nonzero.
pub(crate) fn nonzero(mask: &Tensor) -> Result<Tensor> {
    let as_f32 = if mask.dtype() == DType::F32 {
        mask.clone()
    } else {
        mask.to_dtype(DType::F32)?
    };
    Ok(as_f32.ne(0f32)?.to_dtype(MASK_DTYPE)?)
}

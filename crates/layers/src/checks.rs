//! Lightweight validation helpers shared across layer components.
//!
//! Every helper takes a `label` naming the tensor under inspection so the
//! resulting error points at the offending argument. They return
//! `candle_core::Result<()>` so call sites can propagate with `?`.

use candle_core::{DType, Error, Result, Tensor};

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(label: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let dims = tensor.dims();
    if dims.len() == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected rank {rank}, got shape {dims:?}"
        )))
    }
}

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(label: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Validates that the trailing dimension equals `dim`.
pub fn expect_last_dim(label: &str, tensor: &Tensor, dim: usize) -> Result<()> {
    match tensor.dims().last() {
        Some(&last) if last == dim => Ok(()),
        _ => Err(Error::Msg(format!(
            "{label}: expected trailing dim {dim}, got shape {:?}",
            tensor.dims()
        ))),
    }
}

/// Checks the tensor dtype is one of the allowed values.
pub fn expect_dtype_in(label: &str, tensor: &Tensor, allowed: &[DType]) -> Result<()> {
    let dtype = tensor.dtype();
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected dtype in {allowed:?}, got {dtype:?}"
        )))
    }
}

/// Checks two tensors share a dtype.
pub fn expect_same_dtype(
    label_a: &str,
    a: &Tensor,
    label_b: &str,
    b: &Tensor,
) -> Result<()> {
    if a.dtype() == b.dtype() {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label_a} has dtype {:?} but {label_b} has dtype {:?}",
            a.dtype(),
            b.dtype()
        )))
    }
}

/// Floating point dtypes accepted by projection parameters.
pub const FLOAT_DTYPES: &[DType] = &[DType::F16, DType::BF16, DType::F32];

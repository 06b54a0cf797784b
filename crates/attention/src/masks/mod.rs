//! Mask utilities shared by attention implementations.
//!
//! Masks are keep-masks with dtype [`MASK_DTYPE`]: `1.0` where attention is
//! permitted and `0.0` otherwise, shaped so they broadcast against logits of
//! shape `[batch, num_heads, q_len, k_len]`. Components are combined with a
//! logical AND (elementwise product) and applied by replacing discarded
//! logits with [`MASK_SENTINEL`] before the softmax.
//!
//! The sentinel is finite: a row whose keys are all discarded becomes a row of
//! identical logits and the softmax yields a uniform distribution over every
//! key instead of NaN.
//!
//! The fallback ignores every mask component, the causal one included. When a
//! causal module sees a padding row with no valid key, that row's weights are
//! uniform over all `k_len` keys, future keys `j > i` among them. Rows with at
//! least one kept key always give zero weight to future keys.

pub mod causal;
pub mod padding;
pub mod sparse;

use candle_core::{DType, Device, Tensor};
use candle_nn::ops::softmax_last_dim;

use crate::core::{AttentionError, Result};

/// Dtype shared by all keep-masks.
pub const MASK_DTYPE: DType = DType::F32;

/// Logit value written at discarded positions.
pub const MASK_SENTINEL: f32 = -1.0e9;

pub use causal::{build_causal_mask, CausalMaskCache, DEFAULT_CAUSAL_CACHE_CAPACITY};
pub use padding::{padding_mask_from_flags, padding_mask_from_lengths, padding_mask_from_tensor};
pub use sparse::SparseMask;

/// Shape of the logits a mask is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogitsShape {
    pub batch: usize,
    pub num_heads: usize,
    pub q_len: usize,
    pub k_len: usize,
}

impl LogitsShape {
    pub fn dims(&self) -> (usize, usize, usize, usize) {
        (self.batch, self.num_heads, self.q_len, self.k_len)
    }
}

/// Call-time mask argument.
#[derive(Debug, Clone, Default)]
pub enum AttentionMask {
    /// No masking.
    #[default]
    None,
    /// Valid key length per batch element.
    Lengths(Vec<usize>),
    /// `[batch, k_len]` tensor of any numeric dtype; nonzero marks a valid key.
    Padding(Tensor),
    /// Per-example key validity flags (`true` = valid), one row per batch element.
    Flags(Vec<Vec<bool>>),
    /// `[batch|1, heads|1, q_len|1, k_len]` tensor; nonzero marks a kept pair.
    Dense(Tensor),
    /// Coordinate list densified to `[q_len, k_len]`.
    Sparse(SparseMask),
}

impl AttentionMask {
    /// Dispatches on tensor rank: 1 => lengths, 2 => padding, 4 => dense.
    pub fn from_tensor(mask: &Tensor) -> Result<Self> {
        match mask.rank() {
            1 => {
                let lengths = mask
                    .to_dtype(DType::F64)?
                    .to_vec1::<f64>()?
                    .into_iter()
                    .map(|len| len.max(0.0).ceil() as usize)
                    .collect();
                Ok(Self::Lengths(lengths))
            }
            2 => Ok(Self::Padding(mask.clone())),
            4 => Ok(Self::Dense(mask.clone())),
            _ => Err(AttentionError::mask_shape(format!(
                "cannot interpret mask of shape {:?}; expected [batch], [batch, k_len] or [batch, heads, q_len, k_len]",
                mask.dims()
            ))),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lengths(_) => "lengths",
            Self::Padding(_) => "padding",
            Self::Flags(_) => "flags",
            Self::Dense(_) => "dense",
            Self::Sparse(_) => "sparse",
        }
    }

    /// Resolves the mask into a keep-mask broadcastable to `shape`.
    pub fn resolve(&self, device: &Device, shape: LogitsShape) -> Result<Option<Tensor>> {
        let LogitsShape {
            batch,
            num_heads,
            q_len,
            k_len,
        } = shape;
        let keep = match self {
            Self::None => return Ok(None),
            Self::Lengths(lengths) => {
                if lengths.len() != batch {
                    return Err(AttentionError::mask_shape(format!(
                        "expected {batch} lengths, got {}",
                        lengths.len()
                    )));
                }
                padding_mask_from_lengths(device, lengths, k_len)?
            }
            Self::Padding(mask) => padding_mask_from_tensor(&mask.to_device(device)?, batch, k_len)?,
            Self::Flags(rows) => {
                let keep = padding_mask_from_flags(device, rows)?;
                let (rb, _, _, rk) = keep.dims4()?;
                if rk != k_len || (rb != batch && rb != 1) {
                    return Err(AttentionError::mask_shape(format!(
                        "padding flags are [{rb}, {rk}] but attention expects [{batch}, {k_len}]"
                    )));
                }
                keep
            }
            Self::Dense(mask) => {
                let (mb, mh, mq, mk) = mask.dims4().map_err(|_| {
                    AttentionError::mask_shape(format!(
                        "dense mask must be [batch, heads, q_len, k_len], got {:?}",
                        mask.dims()
                    ))
                })?;
                let fits = |got: usize, want: usize| got == want || got == 1;
                if mk != k_len || !fits(mb, batch) || !fits(mh, num_heads) || !fits(mq, q_len) {
                    return Err(AttentionError::mask_shape(format!(
                        "dense mask [{mb}, {mh}, {mq}, {mk}] does not broadcast to [{batch}, {num_heads}, {q_len}, {k_len}]"
                    )));
                }
                padding::nonzero(&mask.to_device(device)?)?
            }
            Self::Sparse(sparse) => sparse.to_keep_mask(device, q_len, k_len)?,
        };
        Ok(Some(keep))
    }
}

impl From<Vec<usize>> for AttentionMask {
    fn from(lengths: Vec<usize>) -> Self {
        Self::Lengths(lengths)
    }
}

impl From<Vec<Vec<bool>>> for AttentionMask {
    fn from(rows: Vec<Vec<bool>>) -> Self {
        Self::Flags(rows)
    }
}

impl From<SparseMask> for AttentionMask {
    fn from(sparse: SparseMask) -> Self {
        Self::Sparse(sparse)
    }
}

/// Logical AND of two optional keep-masks.
pub fn combine_masks(a: Option<Tensor>, b: Option<Tensor>) -> Result<Option<Tensor>> {
    Ok(match (a, b) {
        (Some(a), Some(b)) => Some(a.broadcast_mul(&b)?),
        (Some(mask), None) | (None, Some(mask)) => Some(mask),
        (None, None) => None,
    })
}

/// Replaces logits at discarded positions with [`MASK_SENTINEL`].
pub fn apply_mask(scores: &Tensor, keep: &Tensor) -> Result<Tensor> {
    let shape = scores.shape();
    let keep = keep
        .broadcast_as(shape)
        .map_err(|_| {
            AttentionError::mask_shape(format!(
                "mask of shape {:?} does not broadcast to logits {:?}",
                keep.dims(),
                scores.dims()
            ))
        })?
        .ne(0f32)?;
    let sentinel = Tensor::new(MASK_SENTINEL, scores.device())?
        .to_dtype(scores.dtype())?
        .broadcast_as(shape)?;
    Ok(keep.where_cond(scores, &sentinel)?)
}

/// Softmax over the last axis after masking.
pub fn masked_softmax(scores: &Tensor, keep: Option<&Tensor>) -> Result<Tensor> {
    let scores = match keep {
        Some(keep) => apply_mask(scores, keep)?,
        None => scores.clone(),
    };
    Ok(softmax_last_dim(&scores)?)
}

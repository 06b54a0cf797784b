//! Multi-head attention: projections, head split, masked attention, merge.
//!
//! Raw queries, keys and values shaped `[batch, seq, feature]` are projected to
//! `model_dim`, split into `num_heads` heads, attended with the
//! [`ExactAttention`] kernel under the effective mask, merged back and passed
//! through the output projection. The module holds no per-call state: the
//! attention weights are returned alongside the output, so a single instance
//! can serve concurrent callers.

use std::fmt;

use candle_core::{Device, Tensor};
use layers::{Dropout, Linear, LinearConfig, LinearInit, LinearLayer};
use rand::rngs::StdRng;

use crate::core::{
    Attention, AttentionConfig, AttentionError, AttentionOutput, ExecutionContext, Result,
};
use crate::heads::{merge_heads, split_heads};
use crate::masks::{combine_masks, AttentionMask, CausalMaskCache, LogitsShape};
use crate::reference::ExactAttention;

/// Query, key, value and output projections.
#[derive(Debug, Clone)]
pub struct Projections {
    pub query: Linear,
    pub key: Linear,
    pub value: Linear,
    pub output: Linear,
}

pub struct MultiHeadAttention {
    config: AttentionConfig,
    device: Device,
    projections: Projections,
    kernel: ExactAttention,
    causal_cache: Option<CausalMaskCache>,
}

impl fmt::Debug for MultiHeadAttention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiHeadAttention")
            .field("model_dim", &self.config.model_dim)
            .field("num_heads", &self.config.num_heads)
            .field("head_dim", &self.config.head_dim())
            .field("causal_mask", &self.config.causal_mask)
            .field("dropout_rate", &self.config.dropout_rate)
            .finish()
    }
}

impl MultiHeadAttention {
    /// Builds the module with Xavier-uniform projections allocated in `ctx`.
    pub fn new(config: AttentionConfig, ctx: &ExecutionContext) -> Result<Self> {
        config.validate()?;
        let build = |input_dim: usize| {
            Linear::with_init(
                LinearConfig::new(input_dim, config.model_dim).with_bias(config.use_bias),
                LinearInit::XavierUniform,
                ctx.device(),
                ctx.dtype(),
            )
        };
        let projections = Projections {
            query: build(config.query_dim())?,
            key: build(config.key_dim())?,
            value: build(config.value_dim())?,
            output: build(config.model_dim)?,
        };
        Self::from_projections(config, projections)
    }

    /// Builds the module around existing projection layers.
    pub fn from_projections(config: AttentionConfig, projections: Projections) -> Result<Self> {
        config.validate()?;
        let expected = [
            ("query", &projections.query, config.query_dim()),
            ("key", &projections.key, config.key_dim()),
            ("value", &projections.value, config.value_dim()),
            ("output", &projections.output, config.model_dim),
        ];
        for (name, layer, input_dim) in expected {
            let lc = layer.config();
            if lc.input_dim != input_dim || lc.output_dim != config.model_dim {
                return Err(AttentionError::Config(format!(
                    "{name} projection maps {} -> {}, expected {input_dim} -> {}",
                    lc.input_dim, lc.output_dim, config.model_dim
                )));
            }
        }

        let device = projections.query.weight().device().clone();
        let dropout = Dropout::new(config.dropout_rate)
            .map_err(|e| AttentionError::Config(e.to_string()))?;
        let causal_cache = config
            .causal_mask
            .then(|| CausalMaskCache::new(device.clone()));

        log::info!(
            "attention::multi_head init model_dim={} heads={} head_dim={} causal={} dropout={} bias={} device={:?}",
            config.model_dim,
            config.num_heads,
            config.head_dim(),
            config.causal_mask,
            config.dropout_rate,
            config.use_bias,
            device.location(),
        );

        Ok(Self {
            config,
            device,
            projections,
            kernel: ExactAttention::with_dropout(dropout),
            causal_cache,
        })
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    /// Number of causal masks currently cached; always 0 without a causal mask.
    pub fn cached_causal_masks(&self) -> usize {
        self.causal_cache.as_ref().map_or(0, CausalMaskCache::len)
    }

    /// `[batch, seq, model_dim]` -> `[batch, num_heads, seq, head_dim]`.
    pub fn split_heads(&self, x: &Tensor) -> Result<Tensor> {
        split_heads(x, self.config.num_heads)
    }

    /// `[batch, num_heads, seq, head_dim]` -> `[batch, seq, model_dim]`.
    pub fn inverse_transpose_qkv(&self, x: &Tensor) -> Result<Tensor> {
        merge_heads(x)
    }

    /// Inference-mode forward pass; dropout is the identity.
    pub fn forward(
        &self,
        queries: &Tensor,
        keys: &Tensor,
        values: &Tensor,
        attention_mask: &AttentionMask,
    ) -> Result<AttentionOutput> {
        self.run(queries, keys, values, attention_mask, None)
    }

    /// Training-mode forward pass drawing dropout randomness from `rng`.
    pub fn forward_train(
        &self,
        queries: &Tensor,
        keys: &Tensor,
        values: &Tensor,
        attention_mask: &AttentionMask,
        rng: &mut StdRng,
    ) -> Result<AttentionOutput> {
        self.run(queries, keys, values, attention_mask, Some(rng))
    }

    fn run(
        &self,
        queries: &Tensor,
        keys: &Tensor,
        values: &Tensor,
        attention_mask: &AttentionMask,
        rng: Option<&mut StdRng>,
    ) -> Result<AttentionOutput> {
        let (batch, q_len) = self.check_input("queries", queries, self.config.query_dim())?;
        let (kb, k_len) = self.check_input("keys", keys, self.config.key_dim())?;
        let (vb, v_len) = self.check_input("values", values, self.config.value_dim())?;
        if kb != batch || vb != batch {
            return Err(AttentionError::shape(format!(
                "batch sizes differ: queries {batch}, keys {kb}, values {vb}"
            )));
        }
        if v_len != k_len {
            return Err(AttentionError::shape(format!(
                "keys have {k_len} positions but values have {v_len}"
            )));
        }

        let heads = self.config.num_heads;
        let q = self.split_heads(&self.projections.query.forward(queries)?)?;
        let k = self.split_heads(&self.projections.key.forward(keys)?)?;
        let v = self.split_heads(&self.projections.value.forward(values)?)?;

        let keep = self.effective_mask(
            attention_mask,
            LogitsShape {
                batch,
                num_heads: heads,
                q_len,
                k_len,
            },
        )?;

        let AttentionOutput { output, weights } = self.kernel.attend(&q, &k, &v, keep.as_ref(), rng)?;
        let merged = self.inverse_transpose_qkv(&output)?;
        let output = self.projections.output.forward(&merged)?;
        Ok(AttentionOutput { output, weights })
    }

    /// Causal component AND the call-time mask, or `None` when nothing masks.
    fn effective_mask(&self, mask: &AttentionMask, shape: LogitsShape) -> Result<Option<Tensor>> {
        log::debug!(
            "attention::multi_head mask={} causal={} shape={:?}",
            mask.kind(),
            self.causal_cache.is_some(),
            shape.dims()
        );
        let causal = match &self.causal_cache {
            Some(cache) => Some(cache.get(shape.q_len, shape.k_len)?),
            None => None,
        };
        let supplied = mask.resolve(&self.device, shape)?;
        combine_masks(causal, supplied)
    }

    fn check_input(&self, name: &str, x: &Tensor, feature_dim: usize) -> Result<(usize, usize)> {
        let (batch, seq, dim) = x.dims3().map_err(|_| {
            AttentionError::shape(format!(
                "{name} must be [batch, seq, {feature_dim}], got {:?}",
                x.dims()
            ))
        })?;
        if dim != feature_dim {
            return Err(AttentionError::shape(format!(
                "{name} must have {feature_dim} features, got {dim}"
            )));
        }
        if x.dtype() != self.projections.query.weight().dtype() {
            return Err(AttentionError::UnsupportedDType {
                requested: format!(
                    "{name} has dtype {:?} but parameters are {:?}",
                    x.dtype(),
                    self.projections.query.weight().dtype()
                ),
            });
        }
        Ok((batch, seq))
    }
}

//! Construction-time configuration for multi-head attention.
//!
//! [`AttentionConfig`] is validated once when a module is built and is
//! immutable afterwards. It deserialises from JSON with the same defaults as
//! [`AttentionConfig::new`].

use serde::{Deserialize, Serialize};

use super::errors::{AttentionError, Result};

fn default_num_heads() -> usize {
    8
}

/// Parameters fixed for the lifetime of a [`MultiHeadAttention`](crate::MultiHeadAttention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Width of the projected queries, keys, values and of the output.
    pub model_dim: usize,
    /// Number of attention heads; must divide `model_dim`.
    #[serde(default = "default_num_heads")]
    pub num_heads: usize,
    /// Dropout applied to attention weights in training mode.
    #[serde(default)]
    pub dropout_rate: f32,
    /// Whether the four projections carry a bias term.
    #[serde(default)]
    pub use_bias: bool,
    /// Forbid queries from attending to later key positions.
    #[serde(default)]
    pub causal_mask: bool,
    /// Feature size of raw queries; defaults to `model_dim`.
    #[serde(default)]
    pub query_dim: Option<usize>,
    /// Feature size of raw keys; defaults to `model_dim`.
    #[serde(default)]
    pub key_dim: Option<usize>,
    /// Feature size of raw values; defaults to `model_dim`.
    #[serde(default)]
    pub value_dim: Option<usize>,
}

impl AttentionConfig {
    pub fn new(model_dim: usize, num_heads: usize) -> Self {
        Self {
            model_dim,
            num_heads,
            dropout_rate: 0.0,
            use_bias: false,
            causal_mask: false,
            query_dim: None,
            key_dim: None,
            value_dim: None,
        }
    }

    pub fn with_dropout(mut self, dropout_rate: f32) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    pub fn with_bias(mut self, use_bias: bool) -> Self {
        self.use_bias = use_bias;
        self
    }

    pub fn with_causal_mask(mut self, causal_mask: bool) -> Self {
        self.causal_mask = causal_mask;
        self
    }

    /// Sets the feature sizes of the raw query, key and value inputs.
    pub fn with_input_dims(mut self, query_dim: usize, key_dim: usize, value_dim: usize) -> Self {
        self.query_dim = Some(query_dim);
        self.key_dim = Some(key_dim);
        self.value_dim = Some(value_dim);
        self
    }

    /// Per-head width, `model_dim / num_heads`.
    pub fn head_dim(&self) -> usize {
        if self.num_heads == 0 {
            0
        } else {
            self.model_dim / self.num_heads
        }
    }

    pub fn query_dim(&self) -> usize {
        self.query_dim.unwrap_or(self.model_dim)
    }

    pub fn key_dim(&self) -> usize {
        self.key_dim.unwrap_or(self.model_dim)
    }

    pub fn value_dim(&self) -> usize {
        self.value_dim.unwrap_or(self.model_dim)
    }

    /// Checks the structural invariants; `model_dim == num_heads * head_dim`.
    pub fn validate(&self) -> Result<()> {
        if self.model_dim == 0 {
            return Err(AttentionError::Config(
                "model_dim must be greater than zero".into(),
            ));
        }
        if self.num_heads == 0 {
            return Err(AttentionError::Config(
                "num_heads must be greater than zero".into(),
            ));
        }
        if self.model_dim % self.num_heads != 0 {
            return Err(AttentionError::Config(format!(
                "model_dim ({}) must be divisible by num_heads ({})",
                self.model_dim, self.num_heads
            )));
        }
        if !self.dropout_rate.is_finite() || !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(AttentionError::Config(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        for (name, dim) in [
            ("query_dim", self.query_dim),
            ("key_dim", self.key_dim),
            ("value_dim", self.value_dim),
        ] {
            if dim == Some(0) {
                return Err(AttentionError::Config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

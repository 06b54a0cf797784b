//! Error types emitted by the attention crate.

use thiserror::Error;

/// Attention-specific error category.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// Construction-time parameters violate an invariant.
    #[error("invalid attention configuration: {0}")]
    Config(String),
    /// Tensor ranks or dimensions do not line up at call time.
    #[error("invalid tensor shape: {context}")]
    Shape { context: String },
    /// The mask cannot be reconciled with the attention logits.
    #[error("invalid mask shape: {context}")]
    MaskShape { context: String },
    /// The kernel does not support the requested data type.
    #[error("unsupported dtype {requested}")]
    UnsupportedDType { requested: String },
    /// A failure raised by the numeric runtime.
    #[error(transparent)]
    Backend(#[from] candle_core::Error),
}

impl AttentionError {
    pub(crate) fn shape(context: impl Into<String>) -> Self {
        Self::Shape {
            context: context.into(),
        }
    }

    pub(crate) fn mask_shape(context: impl Into<String>) -> Self {
        Self::MaskShape {
            context: context.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AttentionError>;

//! Building blocks consumed by the attention core.
//!
//! The crate provides the dense projection and dropout primitives that
//! multi-head attention wraps, plus the shape checks they share. Everything
//! operates on Candle tensors and reports failures through
//! `candle_core::Result`.

pub mod checks;
pub mod dropout;
pub mod linear;

pub use dropout::Dropout;
pub use linear::{Linear, LinearConfig, LinearInit, LinearLayer};

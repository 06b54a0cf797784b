//! Portable, exact implementation of scaled dot-product attention.
//!
//! This path favours clarity over absolute performance and serves as the
//! baseline kernel behind [`MultiHeadAttention`](crate::MultiHeadAttention).

pub mod exact;

pub use exact::ExactAttention;

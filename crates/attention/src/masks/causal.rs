//! Builders for causal attention masks.
//!
//! Causal masks have dtype [`MASK_DTYPE`](super::MASK_DTYPE) and shape
//! `[1, 1, q_len, k_len]`: query `i` keeps key `j` iff `j <= i`. The mask only
//! depends on the two lengths, so [`CausalMaskCache`] shares one tensor per
//! length pair across calls.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use candle_core::{Device, Result, Tensor};

/// Construct a causal keep-mask for the supplied sequence lengths.
pub fn build_causal_mask(device: &Device, q_len: usize, k_len: usize) -> Result<Tensor> {
    let data: Vec<f32> = (0..q_len)
        .flat_map(|q| (0..k_len).map(move |k| if k <= q { 1.0 } else { 0.0 }))
        .collect();
    Tensor::from_vec(data, (1, 1, q_len, k_len), device)
}

/// Length pairs a [`CausalMaskCache`] keeps by default.
pub const DEFAULT_CAUSAL_CACHE_CAPACITY: usize = 16;

/// Thread-safe cache of causal masks keyed by `(q_len, k_len)`.
///
/// At most `capacity` masks are held; inserting past the cap evicts the
/// oldest entry. Cached tensors are never mutated, so handing out clones
/// cannot leak state between calls.
#[derive(Debug)]
pub struct CausalMaskCache {
    device: Device,
    capacity: usize,
    entries: Mutex<CacheEntries>,
}

#[derive(Debug, Default)]
struct CacheEntries {
    masks: HashMap<(usize, usize), Tensor>,
    order: VecDeque<(usize, usize)>,
}

impl CausalMaskCache {
    pub fn new(device: Device) -> Self {
        Self::with_capacity(device, DEFAULT_CAUSAL_CACHE_CAPACITY)
    }

    /// A cache holding at most `capacity` masks. A capacity of 0 disables caching.
    pub fn with_capacity(device: Device, capacity: usize) -> Self {
        Self {
            device,
            capacity,
            entries: Mutex::new(CacheEntries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the causal mask for `(q_len, k_len)`, building it on first use.
    pub fn get(&self, q_len: usize, k_len: usize) -> Result<Tensor> {
        let key = (q_len, k_len);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mask) = entries.masks.get(&key) {
            log::debug!("causal mask cache hit: q_len={q_len} k_len={k_len}");
            return Ok(mask.clone());
        }
        log::debug!("causal mask cache miss: q_len={q_len} k_len={k_len}");
        let mask = build_causal_mask(&self.device, q_len, k_len)?;
        if self.capacity == 0 {
            return Ok(mask);
        }
        while entries.order.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                log::debug!("causal mask cache evict: q_len={} k_len={}", oldest.0, oldest.1);
                entries.masks.remove(&oldest);
            }
        }
        entries.order.push_back(key);
        entries.masks.insert(key, mask.clone());
        Ok(mask)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|entries| entries.masks.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().masks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Inverted dropout driven by caller-scoped randomness.
//!
//! The layer holds no RNG of its own. Training calls pass a seedable
//! [`StdRng`]; inference calls pass `None` and the input is returned
//! unchanged. Survivors are scaled by `1 / (1 - p)` so expectations match
//! between the two modes.

use candle_core::{DType, Error, Result, Tensor};
use rand::{rngs::StdRng, Rng};

/// Dropout with a fixed probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    probability: f32,
}

impl Dropout {
    /// Creates a dropout layer; `probability` must lie in `[0, 1)`.
    pub fn new(probability: f32) -> Result<Self> {
        if !probability.is_finite() || !(0.0..1.0).contains(&probability) {
            return Err(Error::Msg(format!(
                "dropout probability must be in [0, 1), got {probability}"
            )));
        }
        Ok(Self { probability })
    }

    /// Dropout that never drops anything.
    pub const fn disabled() -> Self {
        Self { probability: 0.0 }
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    /// Returns `true` when a training call would actually drop elements.
    pub fn is_active(&self) -> bool {
        self.probability > 0.0
    }

    /// Applies dropout when `rng` is supplied, otherwise acts as identity.
    pub fn forward(&self, tensor: &Tensor, rng: Option<&mut StdRng>) -> Result<Tensor> {
        let rng = match rng {
            Some(rng) if self.is_active() => rng,
            _ => return Ok(tensor.clone()),
        };

        let keep_prob = 1.0 - self.probability;
        let total = tensor.elem_count();
        let mut mask_data = Vec::with_capacity(total);
        for _ in 0..total {
            let sample: f32 = rng.gen();
            mask_data.push(if sample < keep_prob { 1.0f32 } else { 0.0f32 });
        }
        let mask = Tensor::from_vec(mask_data, tensor.dims(), tensor.device())?
            .to_dtype(tensor.dtype())?;
        let dropped = tensor.mul(&mask)?;
        if tensor.dtype() == DType::F32 {
            dropped.affine(1.0 / keep_prob as f64, 0.0)
        } else {
            dropped
                .to_dtype(DType::F32)?
                .affine(1.0 / keep_prob as f64, 0.0)?
                .to_dtype(tensor.dtype())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::SeedableRng;

    #[test]
    fn rejects_out_of_range_probability() {
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout::new(-0.1).is_err());
        assert!(Dropout::new(f32::NAN).is_err());
        assert!(Dropout::new(0.0).is_ok());
    }

    #[test]
    fn inference_is_identity() -> Result<()> {
        let dropout = Dropout::new(0.5)?;
        let input = Tensor::ones((2, 8), DType::F32, &Device::Cpu)?;
        let out = dropout.forward(&input, None)?;
        assert_eq!(out.flatten_all()?.to_vec1::<f32>()?, vec![1.0; 16]);
        Ok(())
    }

    #[test]
    fn training_zeroes_and_rescales() -> Result<()> {
        let dropout = Dropout::new(0.5)?;
        let input = Tensor::ones((64, 64), DType::F32, &Device::Cpu)?;
        let mut rng = StdRng::seed_from_u64(7);
        let values = dropout
            .forward(&input, Some(&mut rng))?
            .flatten_all()?
            .to_vec1::<f32>()?;

        assert!(values.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        let kept = values.iter().filter(|&&v| v != 0.0).count() as f32;
        let ratio = kept / values.len() as f32;
        assert!((ratio - 0.5).abs() < 0.05, "kept ratio {ratio}");
        Ok(())
    }

    #[test]
    fn same_seed_reproduces_mask() -> Result<()> {
        let dropout = Dropout::new(0.3)?;
        let input = Tensor::ones((4, 16), DType::F32, &Device::Cpu)?;
        let a = dropout
            .forward(&input, Some(&mut StdRng::seed_from_u64(11)))?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let b = dropout
            .forward(&input, Some(&mut StdRng::seed_from_u64(11)))?
            .flatten_all()?
            .to_vec1::<f32>()?;
        assert_eq!(a, b);
        Ok(())
    }
}

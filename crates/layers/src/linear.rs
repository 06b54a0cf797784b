//! Dense affine projections.
//!
//! Linear layers accept inputs shaped `(batch, seq, in_dim)` or `(rows, in_dim)`
//! and return the same leading layout with `out_dim` features. Parameters are
//! immutable after construction, so a single layer can serve concurrent
//! forward calls.

use candle_core::{DType, Device, Error, Result, Tensor};

use crate::checks;

/// Configuration shared by dense projection layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Outgoing feature dimension.
    pub output_dim: usize,
    /// Whether a learnable bias vector is applied.
    pub bias: bool,
}

impl LinearConfig {
    /// Creates a configuration for a projection with a bias term.
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
            bias: true,
        }
    }

    /// Toggles the bias term.
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }
}

/// Shared interface for affine projections.
pub trait LinearLayer: Send + Sync {
    /// Returns the static configuration used to validate inputs.
    fn config(&self) -> &LinearConfig;

    /// Applies the projection to `hidden`.
    fn forward(&self, hidden: &Tensor) -> Result<Tensor>;
}

/// Supported weight initialisation policies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearInit {
    /// Xavier/Glorot uniform initialisation.
    XavierUniform,
    /// Xavier/Glorot normal initialisation.
    XavierNormal,
}

impl LinearInit {
    fn sample(&self, shape: (usize, usize), device: &Device, dtype: DType) -> Result<Tensor> {
        let (out_dim, in_dim) = shape;
        let fan_sum = (in_dim + out_dim) as f64;
        let weight = match self {
            LinearInit::XavierUniform => {
                let bound = (6.0 / fan_sum).sqrt() as f32;
                Tensor::rand(-bound, bound, shape, device)?
            }
            LinearInit::XavierNormal => {
                let std = (2.0 / fan_sum).sqrt() as f32;
                Tensor::randn(0f32, std, shape, device)?
            }
        };
        weight.to_dtype(dtype)
    }
}

/// Dense affine projection `y = x W^T + b`.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    /// Constructs a linear layer from existing parameters.
    ///
    /// `weight` is laid out `(output_dim, input_dim)`.
    pub fn new(config: LinearConfig, weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        Self::validate_weight(&config, &weight)?;
        Self::validate_bias(&config, &weight, bias.as_ref())?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Builds a layer with randomly initialised weights and a zero bias.
    pub fn with_init(
        config: LinearConfig,
        init: LinearInit,
        device: &Device,
        dtype: DType,
    ) -> Result<Self> {
        let weight = init.sample((config.output_dim, config.input_dim), device, dtype)?;
        let bias = if config.bias {
            Some(Tensor::zeros(config.output_dim, dtype, device)?)
        } else {
            None
        };
        Self::new(config, weight, bias)
    }

    /// Identity projection, handy for inspecting attention in isolation.
    pub fn identity(dim: usize, device: &Device, dtype: DType) -> Result<Self> {
        let data: Vec<f32> = (0..dim * dim)
            .map(|i| if i / dim == i % dim { 1.0 } else { 0.0 })
            .collect();
        let weight = Tensor::from_vec(data, (dim, dim), device)?.to_dtype(dtype)?;
        Self::new(LinearConfig::new(dim, dim).with_bias(false), weight, None)
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    fn validate_weight(config: &LinearConfig, weight: &Tensor) -> Result<()> {
        checks::expect_rank("linear.weight", weight, 2)?;
        checks::expect_shape(
            "linear.weight",
            weight,
            &[config.output_dim, config.input_dim],
        )?;
        checks::expect_dtype_in("linear.weight", weight, checks::FLOAT_DTYPES)
    }

    fn validate_bias(config: &LinearConfig, weight: &Tensor, bias: Option<&Tensor>) -> Result<()> {
        match (config.bias, bias) {
            (true, Some(tensor)) => {
                checks::expect_shape("linear.bias", tensor, &[config.output_dim])?;
                checks::expect_same_dtype("linear.bias", tensor, "linear.weight", weight)
            }
            (false, Some(_)) => Err(Error::Msg("bias provided but config disables bias".into())),
            (true, None) => Err(Error::Msg("config expects bias but none supplied".into())),
            (false, None) => Ok(()),
        }
    }

    fn validate_input(&self, hidden: &Tensor) -> Result<()> {
        match hidden.dims() {
            [_, _, _] | [_, _] => {
                checks::expect_last_dim("linear.input", hidden, self.config.input_dim)?;
                checks::expect_same_dtype("linear.input", hidden, "linear.weight", &self.weight)
            }
            dims => Err(Error::Msg(format!(
                "linear expects input shaped [B, T, H_in] or [T, H_in], got {dims:?}"
            ))),
        }
    }
}

impl LinearLayer for Linear {
    fn config(&self) -> &LinearConfig {
        &self.config
    }

    fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        self.validate_input(hidden)?;

        let weight_t = self.weight.t()?;
        let mut output = match *hidden.dims() {
            [batch, seq, in_dim] => hidden
                .reshape((batch * seq, in_dim))?
                .matmul(&weight_t)?
                .reshape((batch, seq, self.config.output_dim))?,
            [_, _] => hidden.matmul(&weight_t)?,
            _ => unreachable!("validated above"),
        };

        if let Some(bias) = &self.bias {
            output = output.broadcast_add(bias)?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_linear(input: &[f32], rows: usize, weight: &[f32], bias: &[f32]) -> Vec<f32> {
        let out_dim = bias.len();
        let in_dim = weight.len() / out_dim;
        let mut out = vec![0f32; rows * out_dim];
        for r in 0..rows {
            for o in 0..out_dim {
                let mut acc = bias[o];
                for i in 0..in_dim {
                    acc += input[r * in_dim + i] * weight[o * in_dim + i];
                }
                out[r * out_dim + o] = acc;
            }
        }
        out
    }

    #[test]
    fn forward_matches_reference() -> Result<()> {
        let device = Device::Cpu;
        let config = LinearConfig::new(4, 3);
        let weight_data: Vec<f32> = (0..12).map(|i| (i as f32 - 6.0) * 0.1).collect();
        let bias_data = vec![0.5f32, -0.25, 0.0];
        let linear = Linear::new(
            config,
            Tensor::from_vec(weight_data.clone(), (3, 4), &device)?,
            Some(Tensor::from_vec(bias_data.clone(), 3, &device)?),
        )?;

        let input_data: Vec<f32> = (0..16).map(|i| i as f32 * 0.05).collect();
        let input = Tensor::from_vec(input_data.clone(), (2, 2, 4), &device)?;
        let output = linear.forward(&input)?;
        assert_eq!(output.dims(), &[2, 2, 3]);

        let expected = reference_linear(&input_data, 4, &weight_data, &bias_data);
        let actual = output.flatten_all()?.to_vec1::<f32>()?;
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-5, "{a} vs {e}");
        }
        Ok(())
    }

    #[test]
    fn rejects_mismatched_input_width() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::with_init(
            LinearConfig::new(8, 8),
            LinearInit::XavierUniform,
            &device,
            DType::F32,
        )?;
        let input = Tensor::zeros((1, 3, 5), DType::F32, &device)?;
        assert!(linear.forward(&input).is_err());
        Ok(())
    }

    #[test]
    fn bias_must_agree_with_config() -> Result<()> {
        let device = Device::Cpu;
        let weight = Tensor::zeros((2, 2), DType::F32, &device)?;
        let bias = Tensor::zeros(2, DType::F32, &device)?;
        let no_bias = LinearConfig::new(2, 2).with_bias(false);
        assert!(Linear::new(no_bias, weight.clone(), Some(bias)).is_err());
        assert!(Linear::new(LinearConfig::new(2, 2), weight, None).is_err());
        Ok(())
    }

    #[test]
    fn xavier_uniform_stays_within_bound() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::with_init(
            LinearConfig::new(64, 32),
            LinearInit::XavierUniform,
            &device,
            DType::F32,
        )?;
        let bound = (6.0f32 / 96.0).sqrt();
        let values = linear.weight().flatten_all()?.to_vec1::<f32>()?;
        assert!(values.iter().all(|v| v.abs() <= bound));
        let bias = linear.bias().expect("bias enabled by default");
        assert_eq!(bias.dims(), &[32]);
        Ok(())
    }

    #[test]
    fn identity_projection_is_passthrough() -> Result<()> {
        let device = Device::Cpu;
        let linear = Linear::identity(3, &device, DType::F32)?;
        let input = Tensor::from_vec(vec![1f32, 2., 3., 4., 5., 6.], (1, 2, 3), &device)?;
        let out = linear.forward(&input)?;
        assert_eq!(
            out.flatten_all()?.to_vec1::<f32>()?,
            input.flatten_all()?.to_vec1::<f32>()?
        );
        Ok(())
    }
}

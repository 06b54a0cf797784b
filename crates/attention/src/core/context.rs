//! Explicit execution context handed to module constructors.

use candle_core::{DType, Device};

use super::errors::{AttentionError, Result};

/// Device and parameter dtype used to allocate projection weights.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    device: Device,
    dtype: DType,
}

impl ExecutionContext {
    /// Builds a context, rejecting non-floating parameter dtypes.
    pub fn new(device: Device, dtype: DType) -> Result<Self> {
        if !matches!(dtype, DType::F32 | DType::F16 | DType::BF16) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{dtype:?}"),
            });
        }
        Ok(Self { device, dtype })
    }

    /// `f32` parameters on the host CPU.
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            dtype: DType::F32,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::cpu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_float_parameter_dtypes_are_accepted() {
        for dtype in [DType::F32, DType::F16, DType::BF16] {
            let ctx = ExecutionContext::new(Device::Cpu, dtype).unwrap();
            assert_eq!(ctx.dtype(), dtype);
            assert!(ctx.device().is_cpu());
        }
        let err = ExecutionContext::new(Device::Cpu, DType::U8).unwrap_err();
        assert!(matches!(err, AttentionError::UnsupportedDType { .. }));
    }
}

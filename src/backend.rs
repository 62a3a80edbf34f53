use std::fmt;

use crate::config::Conv2dParams;
use crate::quant::QuantParams;
use crate::tensor::{QTensor, Tensor};

/// Geometry forwarded to the convolution kernel on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dArgs {
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
}

impl From<&Conv2dParams> for Conv2dArgs {
    fn from(p: &Conv2dParams) -> Self {
        Self { stride: p.stride, padding: p.padding, dilation: p.dilation, groups: p.groups }
    }
}

/// The quantized operator library a layer runs on.
///
/// `prepack` must be deterministic: the same raw weight and group count always
/// produce an equivalent packed weight. Saturation, rounding and accumulation
/// width of `conv2d` are defined by the implementation.
pub trait QuantizedKernelBackend {
    /// Backend-specific weight layout. Opaque to the layer.
    type PackedWeight: fmt::Debug;

    fn name(&self) -> &'static str;

    fn prepack(&self, weight: &QTensor, groups: usize) -> anyhow::Result<Self::PackedWeight>;

    /// Runs a 2-D convolution over an `(N, C, H, W)` input and returns an output
    /// quantized with `output`.
    fn conv2d(
        &self,
        input: &QTensor,
        packed: &Self::PackedWeight,
        bias: &Tensor,
        args: &Conv2dArgs,
        output: &QuantParams,
    ) -> anyhow::Result<QTensor>;
}

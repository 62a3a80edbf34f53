use std::fmt;

use log::{debug, warn};

use crate::backend::{Conv2dArgs, QuantizedKernelBackend};
use crate::config::{Conv2dOptions, Conv2dParams};
use crate::error::{QConvError, Result};
use crate::quant::QuantParams;
use crate::shape::conv2d_output_hw;
use crate::tensor::{QTensor, Tensor};

/// Raw weight and its packed form. Only ever replaced together.
#[derive(Debug)]
enum WeightState<P> {
    Unset,
    Set { raw: QTensor, packed: P },
}

/// Inference-only quantized 2-D convolution.
///
/// The layer keeps the raw weight only so the packed form can be rebuilt or
/// inspected; computation always uses the packed form produced by the backend.
pub struct QuantizedConv2d<B: QuantizedKernelBackend> {
    backend: B,
    params: Conv2dParams,
    weight: WeightState<B::PackedWeight>,
    bias: Tensor,
    output: QuantParams,
}

impl<B: QuantizedKernelBackend> QuantizedConv2d<B> {
    pub fn new(
        backend: B,
        weight: QTensor,
        mut bias: Tensor,
        output: QuantParams,
        options: Conv2dOptions,
    ) -> Result<Self> {
        let params = Conv2dParams::from_weight_shape(weight.shape(), &options)?;
        check_bias(&bias, params.out_channels)?;
        let packed = prepack(&backend, &weight, params.groups)?;
        // Inference only
        bias.set_requires_grad(false);
        debug!("qconv2d: built [{}] on backend {}", params, backend.name());
        Ok(Self {
            backend,
            params,
            weight: WeightState::Set { raw: weight, packed },
            bias,
            output,
        })
    }

    pub fn params(&self) -> &Conv2dParams { &self.params }
    pub fn in_channels(&self) -> usize { self.params.in_channels }
    pub fn out_channels(&self) -> usize { self.params.out_channels }
    pub fn kernel_size(&self) -> (usize, usize) { self.params.kernel_size }
    pub fn stride(&self) -> (usize, usize) { self.params.stride }
    pub fn padding(&self) -> (usize, usize) { self.params.padding }
    pub fn dilation(&self) -> (usize, usize) { self.params.dilation }
    pub fn groups(&self) -> usize { self.params.groups }
    pub fn bias(&self) -> &Tensor { &self.bias }
    pub fn output_params(&self) -> &QuantParams { &self.output }
    pub fn backend(&self) -> &B { &self.backend }

    pub fn has_weight(&self) -> bool { matches!(self.weight, WeightState::Set { .. }) }

    /// The packed weight, the only form used for computation.
    pub fn get_packed_weight(&self) -> Result<&B::PackedWeight> {
        match &self.weight {
            WeightState::Set { packed, .. } => Ok(packed),
            WeightState::Unset => Err(QConvError::WeightUnset),
        }
    }

    pub fn raw_weight(&self) -> Option<&QTensor> {
        match &self.weight {
            WeightState::Set { raw, .. } => Some(raw),
            WeightState::Unset => None,
        }
    }

    /// Replaces the raw weight and repacks it with the current `groups`.
    /// On error the layer keeps its previous weight.
    pub fn set_weight(&mut self, weight: QTensor) -> Result<()> {
        let params = self.params.rederive(weight.shape())?;
        check_bias(&self.bias, params.out_channels)?;
        let packed = prepack(&self.backend, &weight, params.groups)?;
        debug!("qconv2d: weight replaced with {} and repacked", weight);
        self.params = params;
        self.weight = WeightState::Set { raw: weight, packed };
        Ok(())
    }

    /// Drops both raw and packed weight and returns the raw one. The layer
    /// cannot run until [`set_weight`](Self::set_weight) is called again.
    pub fn clear_weight(&mut self) -> Option<QTensor> {
        match std::mem::replace(&mut self.weight, WeightState::Unset) {
            WeightState::Set { raw, .. } => {
                debug!("qconv2d: weight cleared");
                Some(raw)
            }
            WeightState::Unset => {
                warn!("qconv2d: clear_weight called with no weight set");
                None
            }
        }
    }

    /// Runs the backend convolution over an `(N, C, H, W)` input.
    pub fn forward(&self, input: &QTensor) -> Result<QTensor> {
        if input.rank() != 4 {
            return Err(QConvError::Shape(format!(
                "input must be 4-D `(N, C, H, W)`, got shape {:?}",
                input.shape()
            )));
        }
        let packed = self.get_packed_weight()?;
        let args = Conv2dArgs::from(&self.params);
        debug!("qconv2d: forward {} via {}", input, self.backend.name());
        self.backend
            .conv2d(input, packed, &self.bias, &args, &self.output)
            .map_err(|source| QConvError::Backend { backend: self.backend.name(), source })
    }

    /// Expected output shape `[N, out_channels, H_out, W_out]` for a 4-D input.
    /// Dimensions are not bounds checked and may be zero or negative.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<[i64; 4]> {
        let &[n, _, h, w] = input_shape else {
            return Err(QConvError::Shape(format!(
                "input must be 4-D `(N, C, H, W)`, got shape {input_shape:?}"
            )));
        };
        let p = &self.params;
        let (oh, ow) =
            conv2d_output_hw((h, w), p.kernel_size, p.padding, p.stride, p.dilation, p.output_padding);
        Ok([n as i64, p.out_channels as i64, oh, ow])
    }

    pub fn describe(&self) -> String { describe_layer(&self.params, &self.output) }
}

impl<B: QuantizedKernelBackend> fmt::Display for QuantizedConv2d<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuantizedConv2d({})", self.describe())
    }
}

impl<B: QuantizedKernelBackend> fmt::Debug for QuantizedConv2d<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantizedConv2d")
            .field("backend", &self.backend.name())
            .field("params", &self.params)
            .field("weight", &self.weight)
            .field("bias", &self.bias)
            .field("output", &self.output)
            .finish()
    }
}

/// Summary line used by [`QuantizedConv2d::describe`].
pub fn describe_layer(params: &Conv2dParams, output: &QuantParams) -> String {
    format!(
        "{}, scale={}, zero_point={}, dtype={}",
        params,
        output.scale(),
        output.zero_point(),
        output.dtype()
    )
}

fn check_bias(bias: &Tensor, out_channels: usize) -> Result<()> {
    if bias.shape() != [out_channels] {
        return Err(QConvError::Shape(format!(
            "bias must have shape [{out_channels}], got {:?}",
            bias.shape()
        )));
    }
    Ok(())
}

fn prepack<B: QuantizedKernelBackend>(backend: &B, weight: &QTensor, groups: usize) -> Result<B::PackedWeight> {
    debug!("qconv2d: prepack {} groups={} via {}", weight, groups, backend.name());
    backend
        .prepack(weight, groups)
        .map_err(|source| QConvError::Backend { backend: backend.name(), source })
}

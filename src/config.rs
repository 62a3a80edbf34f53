use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{QConvError, Result};
use crate::layer::describe_layer;
use crate::quant::{QuantDType, QuantParams};
use crate::shape::conv2d_output_hw;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    #[default]
    #[serde(alias = "zero")]
    Zeros,
    Reflect,
    Replicate,
    Circular,
}

impl fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaddingMode::Zeros => "zeros",
            PaddingMode::Reflect => "reflect",
            PaddingMode::Replicate => "replicate",
            PaddingMode::Circular => "circular",
        };
        f.write_str(s)
    }
}

impl FromStr for PaddingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "zeros" | "zero" => Ok(PaddingMode::Zeros),
            "reflect" => Ok(PaddingMode::Reflect),
            "replicate" => Ok(PaddingMode::Replicate),
            "circular" => Ok(PaddingMode::Circular),
            _ => anyhow::bail!("unknown padding mode: {s}"),
        }
    }
}

/// A per-axis value given either once for both axes or as `(height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrPair {
    Scalar(usize),
    Pair([usize; 2]),
}

impl IntOrPair {
    #[inline]
    pub fn pair(self) -> (usize, usize) {
        match self {
            IntOrPair::Scalar(v) => (v, v),
            IntOrPair::Pair([h, w]) => (h, w),
        }
    }
}

impl From<usize> for IntOrPair {
    fn from(v: usize) -> Self { IntOrPair::Scalar(v) }
}

impl From<(usize, usize)> for IntOrPair {
    fn from((h, w): (usize, usize)) -> Self { IntOrPair::Pair([h, w]) }
}

impl From<[usize; 2]> for IntOrPair {
    fn from(v: [usize; 2]) -> Self { IntOrPair::Pair(v) }
}

/// User-facing convolution options. Everything the weight tensor does not
/// already determine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conv2dOptions {
    pub stride: IntOrPair,
    pub padding: IntOrPair,
    pub dilation: IntOrPair,
    pub groups: usize,
    pub padding_mode: PaddingMode,
    pub transposed: bool,
}

impl Default for Conv2dOptions {
    fn default() -> Self {
        Self {
            stride: IntOrPair::Scalar(1),
            padding: IntOrPair::Scalar(0),
            dilation: IntOrPair::Scalar(1),
            groups: 1,
            padding_mode: PaddingMode::Zeros,
            transposed: false,
        }
    }
}

impl Conv2dOptions {
    pub fn with_stride(mut self, stride: impl Into<IntOrPair>) -> Self { self.stride = stride.into(); self }
    pub fn with_padding(mut self, padding: impl Into<IntOrPair>) -> Self { self.padding = padding.into(); self }
    pub fn with_dilation(mut self, dilation: impl Into<IntOrPair>) -> Self { self.dilation = dilation.into(); self }
    pub fn with_groups(mut self, groups: usize) -> Self { self.groups = groups; self }
    pub fn with_padding_mode(mut self, mode: PaddingMode) -> Self { self.padding_mode = mode; self }
    pub fn with_transposed(mut self, transposed: bool) -> Self { self.transposed = transposed; self }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("parse conv2d options")
    }
}

/// Resolved convolution configuration of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conv2dParams {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
    pub padding_mode: PaddingMode,
    pub transposed: bool,
    pub output_padding: (usize, usize),
}

impl Conv2dParams {
    /// Validates `options` against a `[out_channels, in_channels/groups, kH, kW]`
    /// weight shape and derives the channel counts and kernel size from it.
    pub fn from_weight_shape(weight_shape: &[usize], options: &Conv2dOptions) -> Result<Self> {
        if options.padding_mode != PaddingMode::Zeros {
            return Err(QConvError::UnsupportedMode(options.padding_mode));
        }
        if options.transposed {
            return Err(QConvError::UnsupportedFeature("transposed convolution"));
        }
        let groups = options.groups;
        if groups == 0 {
            return Err(QConvError::InvalidConfig("groups must be positive".into()));
        }
        let stride = options.stride.pair();
        let dilation = options.dilation.pair();
        if stride.0 == 0 || stride.1 == 0 {
            return Err(QConvError::InvalidConfig(format!("stride must be positive, got {stride:?}")));
        }
        if dilation.0 == 0 || dilation.1 == 0 {
            return Err(QConvError::InvalidConfig(format!("dilation must be positive, got {dilation:?}")));
        }
        let (out_channels, in_per_group, kernel_size) = split_weight_shape(weight_shape, groups)?;
        Ok(Self {
            in_channels: in_per_group * groups,
            out_channels,
            kernel_size,
            stride,
            padding: options.padding.pair(),
            dilation,
            groups,
            padding_mode: PaddingMode::Zeros,
            transposed: false,
            output_padding: (0, 0),
        })
    }

    /// Re-derives channel counts and kernel size for a replacement weight,
    /// keeping stride, padding, dilation and groups.
    pub fn rederive(&self, weight_shape: &[usize]) -> Result<Self> {
        let (out_channels, in_per_group, kernel_size) = split_weight_shape(weight_shape, self.groups)?;
        Ok(Self { in_channels: in_per_group * self.groups, out_channels, kernel_size, ..self.clone() })
    }
}

fn split_weight_shape(shape: &[usize], groups: usize) -> Result<(usize, usize, (usize, usize))> {
    let &[out_channels, in_per_group, kh, kw] = shape else {
        return Err(QConvError::Shape(format!(
            "weight must be 4-D `(out_channels, in_channels/groups, kH, kW)`, got shape {shape:?}"
        )));
    };
    if out_channels % groups != 0 {
        return Err(QConvError::InvalidConfig(format!(
            "out_channels {out_channels} is not divisible by groups {groups}"
        )));
    }
    Ok((out_channels, in_per_group, (kh, kw)))
}

impl fmt::Display for Conv2dParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, kernel_size={:?}, stride={:?}",
            self.in_channels, self.out_channels, self.kernel_size, self.stride
        )?;
        if self.padding != (0, 0) {
            write!(f, ", padding={:?}", self.padding)?;
        }
        if self.dilation != (1, 1) {
            write!(f, ", dilation={:?}", self.dilation)?;
        }
        if self.output_padding != (0, 0) {
            write!(f, ", output_padding={:?}", self.output_padding)?;
        }
        if self.groups != 1 {
            write!(f, ", groups={}", self.groups)?;
        }
        if self.padding_mode != PaddingMode::Zeros {
            write!(f, ", padding_mode={}", self.padding_mode)?;
        }
        Ok(())
    }
}

/// Layer description without tensors, as stored in a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPlan {
    pub weight_shape: Vec<usize>,
    pub scale: f64,
    pub zero_point: i32,
    pub dtype: QuantDType,
    #[serde(flatten)]
    pub options: Conv2dOptions,
}

impl LayerPlan {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("open layer plan: {}", path.as_ref().display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse layer plan: {}", path.as_ref().display()))
    }

    pub fn conv_params(&self) -> Result<Conv2dParams> {
        Conv2dParams::from_weight_shape(&self.weight_shape, &self.options)
    }

    pub fn quant_params(&self) -> Result<QuantParams> {
        QuantParams::new(self.scale, self.zero_point, self.dtype)
    }

    /// Validates the plan against an `(N, C, H, W)` input and derives the
    /// layer's output shape. Fails on channel mismatch or an empty output.
    pub fn report(&self, input: &[usize]) -> anyhow::Result<PlanReport> {
        let params = self.conv_params().context("invalid layer configuration")?;
        let quant = self.quant_params().context("invalid output quantization")?;
        let &[n, c, h, w] = input else {
            anyhow::bail!("input must be N,C,H,W, got {:?}", input);
        };
        if c != params.in_channels {
            anyhow::bail!("input has {} channels, layer expects {}", c, params.in_channels);
        }
        let (oh, ow) = conv2d_output_hw(
            (h, w),
            params.kernel_size,
            params.padding,
            params.stride,
            params.dilation,
            params.output_padding,
        );
        if oh <= 0 || ow <= 0 {
            anyhow::bail!("output is empty ({}x{}) for input {}x{}", oh, ow, h, w);
        }
        let output_shape = [n as i64, params.out_channels as i64, oh, ow];
        Ok(PlanReport { params, quant, output_shape })
    }
}

/// What `qconv plan` prints.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub params: Conv2dParams,
    pub quant: QuantParams,
    pub output_shape: [i64; 4],
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n, c, h, w] = self.output_shape;
        writeln!(f, "in_channels: {}", self.params.in_channels)?;
        writeln!(f, "out_channels: {}", self.params.out_channels)?;
        writeln!(f, "layer: QuantizedConv2d({})", describe_layer(&self.params, &self.quant))?;
        write!(f, "output: [{n}, {c}, {h}, {w}]")
    }
}

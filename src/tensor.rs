use std::fmt;

use crate::error::{QConvError, Result};
use crate::quant::{QuantDType, QuantParams};

fn numel(shape: &[usize]) -> usize { shape.iter().product() }

fn check_len(shape: &[usize], len: usize) -> Result<()> {
    if numel(shape) != len {
        return Err(QConvError::Shape(format!(
            "shape {:?} holds {} elements but {} were given",
            shape,
            numel(shape),
            len
        )));
    }
    Ok(())
}

/// Dense row-major `f32` tensor. Used for bias and dequantized views.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
    requires_grad: bool,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        check_len(&shape, data.len())?;
        Ok(Self { shape, data, requires_grad: true })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let n = numel(&shape);
        Self { shape, data: vec![0.0; n], requires_grad: true }
    }

    /// Rank-1 tensor over `data`.
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self { shape: vec![data.len()], data, requires_grad: true }
    }

    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn rank(&self) -> usize { self.shape.len() }
    pub fn numel(&self) -> usize { self.data.len() }
    pub fn data(&self) -> &[f32] { &self.data }

    pub fn requires_grad(&self) -> bool { self.requires_grad }
    pub fn set_requires_grad(&mut self, on: bool) { self.requires_grad = on; }
}

/// Quantized tensor of any rank. Elements are stored widened to `i32` and
/// always lie inside the range of `params.dtype()`.
#[derive(Debug, Clone, PartialEq)]
pub struct QTensor {
    shape: Vec<usize>,
    data: Vec<i32>,
    params: QuantParams,
}

impl QTensor {
    pub fn new(shape: Vec<usize>, data: Vec<i32>, params: QuantParams) -> Result<Self> {
        check_len(&shape, data.len())?;
        let dtype = params.dtype();
        if let Some((i, v)) = data.iter().enumerate().find(|(_, v)| !dtype.contains(**v)) {
            return Err(QConvError::InvalidQuantParams(format!(
                "element {i} = {v} is outside the {dtype} range"
            )));
        }
        Ok(Self { shape, data, params })
    }

    /// Every element set to `value`.
    pub fn filled(shape: Vec<usize>, value: i32, params: QuantParams) -> Result<Self> {
        let n = numel(&shape);
        Self::new(shape, vec![value; n], params)
    }

    pub fn quantize(shape: Vec<usize>, values: &[f32], params: QuantParams) -> Result<Self> {
        check_len(&shape, values.len())?;
        let data = values.iter().map(|&x| params.quantize(x)).collect();
        Ok(Self { shape, data, params })
    }

    pub fn dequantize(&self) -> Tensor {
        let data = self.data.iter().map(|&q| self.params.dequantize(q)).collect();
        Tensor { shape: self.shape.clone(), data, requires_grad: false }
    }

    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn rank(&self) -> usize { self.shape.len() }
    pub fn numel(&self) -> usize { self.data.len() }
    pub fn data(&self) -> &[i32] { &self.data }
    pub fn params(&self) -> &QuantParams { &self.params }
    pub fn dtype(&self) -> QuantDType { self.params.dtype() }
}

impl fmt::Display for QTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        write!(f, "{} ({})", dims.join("x"), self.params.dtype())
    }
}

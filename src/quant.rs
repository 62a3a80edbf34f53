//! Quantization parameters and element kinds.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QConvError, Result};

/// Integer element kind of a quantized tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantDType {
    QUInt8,
    QInt8,
    QInt32,
}

impl QuantDType {
    #[inline]
    pub fn min_value(self) -> i32 {
        match self {
            QuantDType::QUInt8 => 0,
            QuantDType::QInt8 => i8::MIN as i32,
            QuantDType::QInt32 => i32::MIN,
        }
    }

    #[inline]
    pub fn max_value(self) -> i32 {
        match self {
            QuantDType::QUInt8 => u8::MAX as i32,
            QuantDType::QInt8 => i8::MAX as i32,
            QuantDType::QInt32 => i32::MAX,
        }
    }

    #[inline]
    pub fn contains(self, v: i32) -> bool { v >= self.min_value() && v <= self.max_value() }
}

impl fmt::Display for QuantDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuantDType::QUInt8 => "quint8",
            QuantDType::QInt8 => "qint8",
            QuantDType::QInt32 => "qint32",
        };
        f.write_str(s)
    }
}

/// Affine quantization: `real = scale * (q - zero_point)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantParams {
    scale: f64,
    zero_point: i32,
    dtype: QuantDType,
}

impl QuantParams {
    pub fn new(scale: f64, zero_point: i32, dtype: QuantDType) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(QConvError::InvalidQuantParams(format!(
                "scale must be a positive finite number, got {scale}"
            )));
        }
        if !dtype.contains(zero_point) {
            return Err(QConvError::InvalidQuantParams(format!(
                "zero_point {zero_point} is outside the {dtype} range [{}, {}]",
                dtype.min_value(),
                dtype.max_value()
            )));
        }
        Ok(Self { scale, zero_point, dtype })
    }

    pub fn scale(&self) -> f64 { self.scale }
    pub fn zero_point(&self) -> i32 { self.zero_point }
    pub fn dtype(&self) -> QuantDType { self.dtype }

    /// Ties round to even, out-of-range values (infinities included) saturate.
    #[inline]
    pub fn quantize(&self, x: f32) -> i32 {
        // clamp in f64: the quotient can exceed i64 before the zero point is added
        let q = (x as f64 / self.scale).round_ties_even() + self.zero_point as f64;
        q.clamp(self.dtype.min_value() as f64, self.dtype.max_value() as f64) as i32
    }

    #[inline]
    pub fn dequantize(&self, q: i32) -> f32 {
        (self.scale * (q as i64 - self.zero_point as i64) as f64) as f32
    }
}

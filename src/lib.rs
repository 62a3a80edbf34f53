// Inference-only quantized 2-D convolution over a pluggable operator backend
pub mod error;
pub mod shape;
pub mod quant;
pub mod tensor;
pub mod config;
pub mod backend;
pub mod layer;
pub mod testing;

pub use backend::{Conv2dArgs, QuantizedKernelBackend};
pub use config::{Conv2dOptions, Conv2dParams, IntOrPair, LayerPlan, PaddingMode, PlanReport};
pub use error::{QConvError, Result};
pub use layer::QuantizedConv2d;
pub use quant::{QuantDType, QuantParams};
pub use shape::compute_output_dim;
pub use tensor::{QTensor, Tensor};

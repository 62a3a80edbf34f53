use thiserror::Error;

use crate::config::PaddingMode;

/// Errors raised by layer construction, weight replacement and forward dispatch.
#[derive(Debug, Error)]
pub enum QConvError {
    #[error("padding mode `{0}` is not supported, only zero-padding is implemented")]
    UnsupportedMode(PaddingMode),

    #[error("{0} is not supported")]
    UnsupportedFeature(&'static str),

    #[error("shape error: {0}")]
    Shape(String),

    #[error("weight is unset; call set_weight before using the layer")]
    WeightUnset,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid quantization parameters: {0}")]
    InvalidQuantParams(String),

    #[error("kernel backend `{backend}` failed")]
    Backend {
        backend: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, QConvError>;

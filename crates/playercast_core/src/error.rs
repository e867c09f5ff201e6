use thiserror::Error;

/// Errors raised by the forecasting pipeline.
///
/// The pipeline never touches the network, so upstream failures are not
/// represented here; callers wrap this type in their own error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Too few samples to produce anything (an empty series).
    #[error("insufficient data: got {got} samples, need at least {min}")]
    InsufficientData { got: usize, min: usize },

    /// A configuration value is outside its valid domain.
    #[error("invalid forecast configuration: {0}")]
    InvalidConfig(String),

    /// A sample is NaN or infinite.
    #[error("invalid sample at index {index}: {value}")]
    InvalidSample { index: usize, value: f64 },
}

pub type Result<T> = core::result::Result<T, ForecastError>;

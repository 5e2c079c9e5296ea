//! Error types for racoons

use thiserror::Error;

/// Result type alias for racoons operations
pub type Result<T> = std::result::Result<T, RacoonsError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum RacoonsError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted: {0}")]
    ModelNotFitted(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Fold {fold} failed: {reason}")]
    FoldError { fold: usize, reason: String },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl RacoonsError {
    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        RacoonsError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for RacoonsError {
    fn from(err: polars::error::PolarsError) -> Self {
        RacoonsError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for RacoonsError {
    fn from(err: serde_json::Error) -> Self {
        RacoonsError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RacoonsError {
    fn from(err: ndarray::ShapeError) -> Self {
        RacoonsError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for RacoonsError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        RacoonsError::ThreadPoolError(err.to_string())
    }
}

//! Error types for threshold calibration

use thiserror::Error;

/// Result type alias for calibration operations
pub type Result<T> = std::result::Result<T, RcpsError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum RcpsError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RcpsError {
    /// Shorthand for an [`RcpsError::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        RcpsError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RcpsError {
    fn from(err: serde_json::Error) -> Self {
        RcpsError::SerializationError(err.to_string())
    }
}

impl From<polars::error::PolarsError> for RcpsError {
    fn from(err: polars::error::PolarsError) -> Self {
        RcpsError::DataError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RcpsError::ConfigError("gamma out of range".to_string());
        assert_eq!(err.to_string(), "Configuration error: gamma out of range");
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = RcpsError::invalid_parameter("delta", 1.5, "must lie in (0, 1)");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: delta = 1.5, must lie in (0, 1)"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RcpsError = io_err.into();
        assert!(matches!(err, RcpsError::IoError(_)));
    }
}

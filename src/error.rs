//! Error types surfaced by the prediction path

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PredictionError>;

/// Errors a prediction request can end in.
///
/// Startup and artifact loading report through `anyhow`; only what a client
/// can observe is modelled here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// Malformed or out-of-domain request values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// One or more artifacts were not loaded at startup
    #[error("Prediction service not fully initialized. Missing {0}.")]
    ServiceUnavailable(String),

    /// Failure inside preprocessing or model evaluation
    #[error("Prediction error: {0}")]
    Prediction(String),
}

impl PredictionError {
    /// Short machine-readable kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::InvalidInput(_) => "invalid_input",
            PredictionError::ServiceUnavailable(_) => "service_unavailable",
            PredictionError::Prediction(_) => "prediction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PredictionError::ServiceUnavailable("model, scaler".to_string());
        assert_eq!(
            err.to_string(),
            "Prediction service not fully initialized. Missing model, scaler."
        );
        assert_eq!(err.kind(), "service_unavailable");

        let err = PredictionError::InvalidInput("unknown fuel type 'Q'".to_string());
        assert!(err.to_string().starts_with("Invalid input"));
    }
}

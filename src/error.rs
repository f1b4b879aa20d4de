//! Error types for tabsight

use thiserror::Error;

/// Result type alias for tabsight operations
pub type Result<T> = std::result::Result<T, TabsightError>;

/// Main error type for the training, advisory and reporting pipeline
#[derive(Error, Debug)]
pub enum TabsightError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Training cancelled after epoch {epoch}")]
    Cancelled { epoch: usize },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for TabsightError {
    fn from(err: polars::error::PolarsError) -> Self {
        TabsightError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TabsightError {
    fn from(err: serde_json::Error) -> Self {
        TabsightError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TabsightError {
    fn from(err: ndarray::ShapeError) -> Self {
        TabsightError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

//! Error handling

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FloodError>;

#[derive(Debug, Error)]
pub enum FloodError {
    /// Artifacts absent, invalid or from mismatched runs
    #[error("Model not loaded: {0}")]
    ModelUnavailable(String),

    /// Request features missing, empty or of the wrong shape
    #[error("Invalid input shape: {0}")]
    InputShape(String),

    /// Training table unusable (too few rows, bad CSV, unordered timestamps)
    #[error("Training data error: {0}")]
    TrainingData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

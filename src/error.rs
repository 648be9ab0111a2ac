//! Error types for OpsAgent

use thiserror::Error;

/// Result type alias using OpsAgent's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for OpsAgent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The model endpoint could not be reached (transport failure)
    #[error("Model unreachable: {0}")]
    ModelUnreachable(String),

    /// The model endpoint returned a non-2xx status
    #[error("Model error ({status}): {message}")]
    ModelError { status: u16, message: String },

    /// The model response body could not be parsed
    #[error("Malformed model response: {0}")]
    ModelMalformed(String),

    /// The Planner emitted JSON that is missing fields or unparseable
    #[error("Invalid planner output: {0}")]
    PlannerInvalidOutput(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is a model-side failure (transport, HTTP, or parse)
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            Error::ModelUnreachable(_) | Error::ModelError { .. } | Error::ModelMalformed(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ModelUnreachable(err.to_string())
    }
}

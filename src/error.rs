//! Error types for the multigenie workflow

use thiserror::Error;

/// Result type alias for multigenie operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the multigenie workflow
#[derive(Debug, Error)]
pub enum Error {
    /// Error returned by the model serving endpoint
    #[error("Model serving error: {0}")]
    Model(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Structured model output outside the allowed set
    #[error("Structured output error: {0}")]
    StructuredOutput(String),

    /// Worker invocation error
    #[error("Worker error: {worker}: {message}")]
    Worker {
        /// Worker name
        worker: String,
        /// Failure description
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a model serving error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a structured output error
    pub fn structured_output(msg: impl Into<String>) -> Self {
        Self::StructuredOutput(msg.into())
    }

    /// Create a worker error
    pub fn worker(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            worker: worker.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

//! Error types for inferlet

use thiserror::Error;

/// Main error type for inferlet
#[derive(Error, Debug)]
pub enum InferletError {
    /// The container could not be created or started
    #[error("Launch error: {0}")]
    Launch(String),

    /// The container engine could not be reached
    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Compose descriptor is missing, invalid or references an unknown service
    #[error("Descriptor error: {0}")]
    Descriptor(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The operation was interrupted before it completed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for inferlet operations
pub type InferletResult<T> = Result<T, InferletError>;

impl InferletError {
    /// Whether this error is one of the terminal deployment failures
    /// (launch refused or engine unreachable)
    pub fn is_deployment_failure(&self) -> bool {
        matches!(
            self,
            InferletError::Launch(_) | InferletError::RuntimeUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for InferletError {
    fn from(err: serde_json::Error) -> Self {
        InferletError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for InferletError {
    fn from(err: toml::de::Error) -> Self {
        InferletError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for InferletError {
    fn from(err: serde_yaml::Error) -> Self {
        InferletError::Descriptor(err.to_string())
    }
}

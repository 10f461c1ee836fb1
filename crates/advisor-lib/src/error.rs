//! Error types shared across the advisor library

use aws_smithy_types::error::display::DisplayErrorContext;
use thiserror::Error;

/// Errors raised by the advisor library
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Credential resolution or role assumption failed
    #[error("credential error: {0}")]
    Credentials(String),

    /// An AWS API call failed
    #[error("{operation} failed: {message}")]
    Cloud { operation: String, message: String },

    /// The language model could not be invoked
    #[error("model invocation failed: {0}")]
    Model(String),

    /// The language model replied with something we could not use
    #[error("unusable model response: {0}")]
    ModelResponse(String),

    /// The knowledge store rejected a read or write
    #[error("store error: {0}")]
    Store(String),

    /// Outbound email failed
    #[error("email error: {0}")]
    Email(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl AdvisorError {
    /// Wrap an SDK error, keeping the full error chain in the message
    pub fn cloud<E>(operation: &str, err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::Cloud {
            operation: operation.to_string(),
            message: DisplayErrorContext(&err).to_string(),
        }
    }

    pub fn store<E>(operation: &str, err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::Store(format!("{}: {}", operation, DisplayErrorContext(&err)))
    }

    /// Short machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials",
            Self::Cloud { .. } => "cloud_api",
            Self::Model(_) => "model",
            Self::ModelResponse(_) => "model_response",
            Self::Store(_) => "store",
            Self::Email(_) => "email",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;

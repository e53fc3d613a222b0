// Central Error Type for the Client

use thiserror::Error;

/// Client-level error type
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Server-provided detail when available, generic transport text otherwise.
    /// This is the string that ends up in the log sink on a failed submission.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { message, .. } if !message.trim().is_empty() => {
                format!("Error: {}", message.trim())
            }
            ClientError::Api { status, .. } => format!("Error: server returned HTTP {}", status),
            ClientError::Network(msg) => format!("Error: network failure ({})", msg),
            other => format!("Error: {}", other),
        }
    }
}

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

// From implementation for infra crates (to avoid circular dependency)
impl From<String> for ClientError {
    fn from(err: String) -> Self {
        ClientError::Storage(err)
    }
}

//! Client error types.

use std::error::Error as _;

use eventbell_core::TracingError;
use eventbell_providers::ProviderError;
use eventbell_server::ServerError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Calendar provider or credential failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Poll loop failure.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Renders the error followed by up to two levels of its source chain.
    pub fn describe(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        for _ in 0..2 {
            let Some(cause) = source else { break };
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

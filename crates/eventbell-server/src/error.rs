//! Server error types and their recovery policy.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use eventbell_providers::{ProviderError, ProviderErrorCode};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// How many `source()` levels are included when an error is logged.
const SOURCE_DEPTH: usize = 2;

/// Coarse classification of a failure, driving what the poll loop does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid configuration.
    Config,
    /// The credential was rejected.
    Auth,
    /// Transport failures, timeouts, 5xx and 429 responses.
    Network,
    /// A response or local resource that could not be understood.
    Data,
}

/// What the poll loop does after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Log, sleep the fixed interval, try again.
    Retry,
    /// Refresh the credential once, then retry.
    RefreshAuth,
    /// Stop the loop.
    Fatal,
}

impl ErrorKind {
    pub fn recovery(self) -> Recovery {
        match self {
            Self::Config => Recovery::Fatal,
            Self::Auth => Recovery::RefreshAuth,
            Self::Network | Self::Data => Recovery::Retry,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ProviderErrorCode> for ErrorKind {
    fn from(code: ProviderErrorCode) -> Self {
        match code {
            ProviderErrorCode::AuthenticationFailed => Self::Auth,
            ProviderErrorCode::ConfigurationError
            | ProviderErrorCode::BadRequest
            | ProviderErrorCode::NotFound => Self::Config,
            ProviderErrorCode::InvalidResponse | ProviderErrorCode::InternalError => Self::Data,
            // Google also answers 403 for quota exhaustion.
            ProviderErrorCode::AuthorizationFailed
            | ProviderErrorCode::NetworkError
            | ProviderErrorCode::RateLimited
            | ProviderErrorCode::ServerError => Self::Network,
        }
    }
}

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The calendar source failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An actuator could not signal the reminder.
    #[error("actuator {actuator} failed: {message}")]
    Actuator {
        actuator: String,
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an actuator error.
    pub fn actuator(actuator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Actuator {
            actuator: actuator.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an actuator error with an underlying cause.
    pub fn actuator_with_source<E>(
        actuator: impl Into<String>,
        message: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Actuator {
            actuator: actuator.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Config,
            Self::Provider(e) => e.code().into(),
            Self::Actuator { .. } | Self::Io(_) => ErrorKind::Data,
        }
    }

    /// Renders the error followed by up to two levels of its source chain.
    pub fn describe(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        for _ in 0..SOURCE_DEPTH {
            let Some(cause) = source else { break };
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_per_kind() {
        assert_eq!(ErrorKind::Config.recovery(), Recovery::Fatal);
        assert_eq!(ErrorKind::Auth.recovery(), Recovery::RefreshAuth);
        assert_eq!(ErrorKind::Network.recovery(), Recovery::Retry);
        assert_eq!(ErrorKind::Data.recovery(), Recovery::Retry);
    }

    #[test]
    fn provider_codes_are_classified() {
        let kind = |e: ProviderError| ServerError::from(e).kind();
        assert_eq!(kind(ProviderError::authentication("401")), ErrorKind::Auth);
        assert_eq!(kind(ProviderError::configuration("x")), ErrorKind::Config);
        assert_eq!(kind(ProviderError::not_found("no calendar")), ErrorKind::Config);
        assert_eq!(kind(ProviderError::network("reset")), ErrorKind::Network);
        assert_eq!(kind(ProviderError::rate_limited("429")), ErrorKind::Network);
        assert_eq!(kind(ProviderError::server("502")), ErrorKind::Network);
        assert_eq!(kind(ProviderError::invalid_response("json")), ErrorKind::Data);
    }

    #[test]
    fn config_and_actuator_kinds() {
        assert_eq!(ServerError::config("no calendars").kind(), ErrorKind::Config);
        assert_eq!(ServerError::actuator("gpio", "write").kind(), ErrorKind::Data);
    }

    #[test]
    fn describe_includes_two_source_levels() {
        #[derive(Debug, Error)]
        #[error("outer io")]
        struct Outer(#[source] io::Error);

        let inner = io::Error::other("connection reset");
        let provider =
            ProviderError::network("request failed").with_source(Outer(inner));
        let err = ServerError::from(provider);

        assert_eq!(
            err.describe(),
            "network_error: request failed: outer io: connection reset"
        );
    }

    #[test]
    fn describe_without_source() {
        assert_eq!(
            ServerError::config("no calendars").describe(),
            "configuration error: no calendars"
        );
    }
}

//! Error types for calendar provider operations.
//!
//! Every failure a provider can report carries a [`ProviderErrorCode`] so the
//! poll loop can decide whether to retry, refresh credentials, or give up.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials are missing, invalid or expired.
    AuthenticationFailed,
    /// The credentials are valid but lack access to the calendar.
    AuthorizationFailed,
    /// Connection failed, timed out, DNS resolution failed.
    NetworkError,
    /// Too many requests.
    RateLimited,
    /// The server returned a 5xx status.
    ServerError,
    /// The response body could not be understood.
    InvalidResponse,
    /// The calendar does not exist (404).
    NotFound,
    /// The request was rejected as malformed (400).
    BadRequest,
    /// Missing or invalid configuration.
    ConfigurationError,
    /// Unexpected provider state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if the failure is transient and the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError | Self::InvalidResponse
        )
    }

    /// Returns true if the failure can only be fixed by new or refreshed credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }

    /// Returns a stable snake_case name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that occurred while talking to a calendar provider.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The provider that produced the error (e.g. "google").
    provider: Option<String>,
    /// The calendar being queried, if the error is tied to one.
    calendar_id: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            calendar_id: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the calendar the error relates to.
    pub fn with_calendar(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = Some(calendar_id.into());
        self
    }

    /// Sets the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn calendar_id(&self) -> Option<&str> {
        self.calendar_id.as_deref()
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns a copy without the source chain.
    pub fn detached(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            provider: self.provider.clone(),
            calendar_id: self.calendar_id.clone(),
            source: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(ref calendar_id) = self.calendar_id {
            write!(f, " (calendar {})", calendar_id)?;
        }
        Ok(())
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_retryable() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::RateLimited.is_retryable());
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(ProviderErrorCode::InvalidResponse.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationFailed.is_retryable());
        assert!(!ProviderErrorCode::ConfigurationError.is_retryable());
    }

    #[test]
    fn only_authentication_is_auth() {
        assert!(ProviderErrorCode::AuthenticationFailed.is_auth());
        assert!(!ProviderErrorCode::AuthorizationFailed.is_auth());
        assert!(!ProviderErrorCode::NetworkError.is_auth());
    }

    #[test]
    fn display_includes_provider_and_calendar() {
        let err = ProviderError::server("bad gateway")
            .with_provider("google")
            .with_calendar("team@example.com");
        let display = err.to_string();
        assert_eq!(
            display,
            "[google] server_error: bad gateway (calendar team@example.com)"
        );
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::other("reset by peer");
        let err = ProviderError::network("request failed").with_source(io_err);
        assert!(err.source().is_some());
        assert!(err.detached().source().is_none());
    }
}

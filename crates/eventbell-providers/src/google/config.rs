//! Google Calendar provider configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 client credentials for Google API access.
///
/// Google requires a registered application, so users supply their own
/// client ID and secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
}

/// Layout of the client secrets JSON downloaded from Google Cloud Console.
///
/// Accepts an `installed` or `web` section, or the two keys at the root.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsSection>,
    web: Option<ClientSecretsSection>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a client secrets JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}",
                path.display()
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a client secrets JSON string.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration("failed to parse credentials JSON").with_source(e)
        })?;

        if let Some(section) = file.installed.or(file.web) {
            return Ok(Self::new(section.client_id, section.client_secret));
        }

        match (file.client_id, file.client_secret) {
            (Some(id), Some(secret)) => Ok(Self::new(id, secret)),
            _ => Err(ProviderError::configuration(
                "credentials file needs an 'installed' or 'web' section, or client_id and client_secret at the root",
            )),
        }
    }

    /// Checks that the credentials look like a Google OAuth client.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(ProviderError::configuration(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

/// Configuration for the Google Calendar provider.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client credentials.
    pub credentials: OAuthCredentials,

    /// API key sent as the `key` query parameter, if set.
    pub developer_key: Option<String>,

    /// Where the OAuth tokens are stored.
    ///
    /// Defaults to `<config dir>/eventbell/credentials.json`.
    pub token_path: PathBuf,

    /// Per-request timeout.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// Port range tried for the loopback consent server.
    pub loopback_port_range: (u16, u16),

    /// OAuth scopes to request.
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-only calendar access is all that is needed.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    /// Creates a configuration with defaults for everything but the credentials.
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            developer_key: None,
            token_path: Self::default_token_path(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("eventbell/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
        }
    }

    /// Returns the default token storage path.
    pub fn default_token_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventbell")
            .join("credentials.json")
    }

    pub fn with_developer_key(mut self, key: impl Into<String>) -> Self {
        self.developer_key = Some(key.into());
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Returns the scopes as string slices.
    pub fn scope_refs(&self) -> Vec<&str> {
        self.scopes.iter().map(String::as_str).collect()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ProviderResult<()> {
        self.credentials.validate()?;

        if self.scopes.is_empty() {
            return Err(ProviderError::configuration(
                "at least one OAuth scope is required",
            ));
        }

        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(ProviderError::configuration("invalid loopback port range"));
        }

        if self.developer_key.as_deref().is_some_and(str::is_empty) {
            return Err(ProviderError::configuration("developer_key is empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    fn test_credentials() -> OAuthCredentials {
        OAuthCredentials::new("test-client.apps.googleusercontent.com", "test-secret")
    }

    #[test]
    fn credentials_validation() {
        assert!(test_credentials().validate().is_ok());
        assert!(OAuthCredentials::new("", "secret").validate().is_err());
        assert!(OAuthCredentials::new("bad-id", "secret").validate().is_err());
        assert!(
            OAuthCredentials::new("test.apps.googleusercontent.com", "")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::new(test_credentials());
        assert!(config.developer_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.scope_refs(), vec![GoogleConfig::DEFAULT_SCOPE]);
        assert!(config.token_path.ends_with("eventbell/credentials.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let no_scopes = GoogleConfig::new(test_credentials()).with_scopes(vec![]);
        assert!(no_scopes.validate().is_err());

        let bad_ports = GoogleConfig::new(test_credentials()).with_loopback_port_range(9010, 9000);
        assert!(bad_ports.validate().is_err());

        let empty_key = GoogleConfig::new(test_credentials()).with_developer_key("");
        assert!(empty_key.validate().is_err());
    }

    #[test]
    fn credentials_from_json_installed() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "project_id": "my-project"
            }
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn credentials_from_json_web() {
        let json = r#"{ "web": { "client_id": "w.apps.googleusercontent.com", "client_secret": "s" } }"#;
        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds, OAuthCredentials::new("w.apps.googleusercontent.com", "s"));
    }

    #[test]
    fn credentials_from_json_flat() {
        let json = r#"{
            "client_id": "flat-id.apps.googleusercontent.com",
            "client_secret": "flat-secret",
            "refresh_token": "ignored"
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "flat-id.apps.googleusercontent.com");
    }

    #[test]
    fn credentials_from_json_errors() {
        let err = OAuthCredentials::from_json(r#"{ "other": {} }"#).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert!(err.message().contains("client_id"));

        let err = OAuthCredentials::from_json("not json").unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn credentials_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = OAuthCredentials::from_file(dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }
}

//! Google Calendar provider implementation.
//!
//! This module implements the [`CalendarProvider`] trait for Google Calendar
//! and the start-up credential acquisition that runs before polling begins.

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarEvents, CalendarProvider, FetchOptions};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::{TokenInfo, TokenStorage};

/// Whether [`GoogleProvider::acquire_credential`] may open a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    /// Run the interactive consent flow when no usable credential exists.
    Allowed,
    /// Fail with an authentication error instead.
    Denied,
}

/// Google Calendar provider.
pub struct GoogleProvider {
    config: GoogleConfig,
    token_storage: TokenStorage,
    oauth_client: OAuthClient,
    api_client: GoogleCalendarClient,
    /// Serializes refreshes so one expired token is refreshed once.
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("token_path", &self.token_storage.path())
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl GoogleProvider {
    /// Creates a provider. No credential is read until
    /// [`acquire_credential`](Self::acquire_credential) is called.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;

        let token_storage = TokenStorage::new(&config.token_path);
        let oauth_client = OAuthClient::new(config.credentials.clone(), config.timeout)?;
        let api_client = GoogleCalendarClient::new(
            config.timeout,
            &config.user_agent,
            config.developer_key.clone(),
        )?;

        Ok(Self {
            config,
            token_storage,
            oauth_client,
            api_client,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Replaces the API client (used to point at a local server in tests).
    pub fn with_api_client(mut self, api_client: GoogleCalendarClient) -> Self {
        self.api_client = api_client;
        self
    }

    /// Makes sure a usable credential is in memory.
    ///
    /// Loads the stored tokens and refreshes them if expired. When nothing
    /// usable remains, runs the consent flow if `consent` allows it.
    ///
    /// # Errors
    ///
    /// Authentication errors when no credential can be obtained, and
    /// configuration errors when the token file cannot be read or written.
    pub async fn acquire_credential(&self, consent: Consent) -> ProviderResult<()> {
        let loaded = match self.token_storage.load() {
            Ok(loaded) => loaded,
            Err(e) if e.code().is_auth() => {
                warn!(error = %e, "discarding unreadable credential");
                false
            }
            Err(e) => return Err(e),
        };

        let scopes = self.config.scope_refs();
        if loaded && !self.token_storage.needs_reauth(&scopes) {
            if self.token_storage.has_valid_tokens() {
                debug!("stored credential is valid");
                return Ok(());
            }
            match self.refresh().await {
                Ok(()) => return Ok(()),
                Err(e) if e.code().is_auth() => {
                    warn!(error = %e, "stored credential could not be refreshed");
                }
                Err(e) => return Err(e),
            }
        }

        match consent {
            Consent::Allowed => self.authenticate().await,
            Consent::Denied => Err(ProviderError::authentication(
                "no usable credential; run `eventbell auth`",
            )
            .with_provider(self.name())),
        }
    }

    /// Runs the interactive consent flow and stores the result.
    pub async fn authenticate(&self) -> ProviderResult<()> {
        info!("starting Google consent flow");
        let tokens = self
            .oauth_client
            .authorize(&self.config.scope_refs(), self.config.loopback_port_range)
            .await?;
        self.token_storage.set(tokens)?;
        info!(path = %self.token_storage.path().display(), "credential stored");
        Ok(())
    }

    /// Returns the stored credential, if any.
    pub fn credential(&self) -> Option<TokenInfo> {
        self.token_storage.get()
    }

    async fn refresh(&self) -> ProviderResult<()> {
        let _guard = self.refresh_lock.lock().await;

        let tokens = self.token_storage.get().ok_or_else(|| {
            ProviderError::authentication("no credential loaded").with_provider(self.name())
        })?;

        debug!("refreshing access token");
        let tokens = self
            .oauth_client
            .refresh(tokens)
            .await
            .map_err(|e| e.with_provider(self.name()))?;
        self.token_storage.set(tokens)
    }

    /// Returns an access token, refreshing it first if it has expired.
    async fn access_token(&self) -> ProviderResult<String> {
        if !self.token_storage.has_valid_tokens() && self.token_storage.get().is_some() {
            self.refresh().await?;
        }
        self.token_storage.access_token().ok_or_else(|| {
            ProviderError::authentication("not authenticated").with_provider(self.name())
        })
    }
}

impl CalendarProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn fetch_calendar<'a>(
        &'a self,
        calendar_id: &'a str,
        options: &'a FetchOptions,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvents>> {
        Box::pin(async move {
            let access_token = self.access_token().await?;
            self.api_client
                .list_events(
                    &access_token,
                    calendar_id,
                    &options.time_window,
                    options.single_events,
                )
                .await
                .map_err(|e| e.with_provider(self.name()))
        })
    }

    fn refresh_auth(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(self.refresh())
    }

    fn is_authenticated(&self) -> bool {
        self.token_storage.has_valid_tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::google::OAuthCredentials;
    use chrono::{TimeZone, Utc};
    use eventbell_core::TimeWindow;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> GoogleConfig {
        GoogleConfig::new(OAuthCredentials::new(
            "test.apps.googleusercontent.com",
            "secret",
        ))
        .with_token_path(dir.path().join("credentials.json"))
    }

    #[test]
    fn new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let bad = config(&dir).with_scopes(vec![]);
        let err = GoogleProvider::new(bad).unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn valid_stored_credential_is_used() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        TokenStorage::new(&config.token_path)
            .set(TokenInfo::new(
                "access",
                Some("refresh".into()),
                Some(3600),
                vec![GoogleConfig::DEFAULT_SCOPE.to_string()],
            ))
            .unwrap();

        let provider = GoogleProvider::new(config).unwrap();
        assert!(!provider.is_authenticated());

        provider.acquire_credential(Consent::Denied).await.unwrap();
        assert!(provider.is_authenticated());
        assert_eq!(provider.credential().unwrap().access_token, "access");
    }

    #[tokio::test]
    async fn missing_credential_without_consent_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let provider = GoogleProvider::new(config(&dir)).unwrap();

        let err = provider.acquire_credential(Consent::Denied).await.unwrap_err();
        assert!(err.code().is_auth());
    }

    #[tokio::test]
    async fn credential_missing_scope_needs_consent() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        TokenStorage::new(&config.token_path)
            .set(TokenInfo::new("access", None, Some(3600), vec![]))
            .unwrap();

        let provider = GoogleProvider::new(config).unwrap();
        let err = provider.acquire_credential(Consent::Denied).await.unwrap_err();
        assert!(err.code().is_auth());
    }

    #[tokio::test]
    async fn fetch_without_credential_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let provider = GoogleProvider::new(config(&dir)).unwrap();
        let options = FetchOptions::new(TimeWindow::days_from(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            5,
        ).unwrap());

        let err = provider.fetch_calendar("primary", &options).await.unwrap_err();
        assert!(err.code().is_auth());
        assert_eq!(err.provider(), Some("google"));
    }
}

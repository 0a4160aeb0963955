//! CalendarProvider trait definition.
//!
//! This module defines the [`CalendarProvider`] trait, the abstraction the
//! poll loop queries once per calendar per cycle.
//!
//! Providers are responsible for:
//! - Fetching the events of one calendar inside a time window
//! - Reporting that calendar's own default reminder
//! - Handling authentication and credential refresh

use std::future::Future;
use std::pin::Pin;

use eventbell_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;

/// The events of one calendar, as returned by a single query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarEvents {
    /// The calendar that was queried.
    pub calendar_id: String,
    /// Events in provider order.
    pub events: Vec<RawEvent>,
    /// Minutes of the calendar's first default reminder, if it has any.
    pub default_reminder_minutes: Option<i64>,
}

impl CalendarEvents {
    /// Creates a batch for the given calendar.
    pub fn new(calendar_id: impl Into<String>, events: Vec<RawEvent>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            events,
            default_reminder_minutes: None,
        }
    }

    /// Builder method to set the calendar's default reminder.
    pub fn with_default_reminder(mut self, minutes: i64) -> Self {
        self.default_reminder_minutes = Some(minutes);
        self
    }

    /// Returns the calendar's own default, or `fallback` when it has none.
    pub fn default_reminder_or(&self, fallback: i64) -> i64 {
        self.default_reminder_minutes.unwrap_or(fallback)
    }
}

/// Options for fetching events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Time window to fetch events for.
    pub time_window: TimeWindow,
    /// Whether to expand recurring events into single instances.
    pub single_events: bool,
}

impl FetchOptions {
    /// Creates fetch options for the window, with recurring expansion on.
    pub fn new(time_window: TimeWindow) -> Self {
        Self {
            time_window,
            single_events: true,
        }
    }

    /// Builder method to toggle recurring event expansion.
    pub fn with_single_events(mut self, single_events: bool) -> Self {
        self.single_events = single_events;
        self
    }
}

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the application context can
/// hold a `Box<dyn CalendarProvider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for calendar sources.
///
/// # Implementation Notes
///
/// - Implementations should be `Send + Sync` for use in async contexts
/// - `fetch_calendar` must handle pagination internally
/// - An expired or rejected credential is reported as
///   [`ProviderErrorCode::AuthenticationFailed`](crate::ProviderErrorCode::AuthenticationFailed)
///   so the caller can try [`refresh_auth`](CalendarProvider::refresh_auth)
pub trait CalendarProvider: Send + Sync {
    /// Returns the name/type of this provider (e.g., "google").
    fn name(&self) -> &str;

    /// Fetches the events of one calendar inside the window.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on network errors, authentication failures,
    /// and unparseable responses.
    fn fetch_calendar<'a>(
        &'a self,
        calendar_id: &'a str,
        options: &'a FetchOptions,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvents>>;

    /// Refreshes the authentication credential.
    ///
    /// Returns an error if refresh fails (e.g., the refresh token was revoked).
    fn refresh_auth(&self) -> BoxFuture<'_, ProviderResult<()>>;

    /// Checks if the provider currently holds a usable credential.
    fn is_authenticated(&self) -> bool;
}

/// A provider that always returns an error.
///
/// Useful for testing, or as a placeholder when a provider fails to
/// initialize.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn error(&self) -> ProviderError {
        self.error.detached().with_provider(&self.name)
    }
}

impl CalendarProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_calendar<'a>(
        &'a self,
        calendar_id: &'a str,
        _options: &'a FetchOptions,
    ) -> BoxFuture<'a, ProviderResult<CalendarEvents>> {
        let error = self.error().with_calendar(calendar_id);
        Box::pin(async move { Err(error) })
    }

    fn refresh_auth(&self) -> BoxFuture<'_, ProviderResult<()>> {
        let error = self.error();
        Box::pin(async move { Err(error) })
    }

    fn is_authenticated(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::{TimeZone, Utc};

    fn window() -> TimeWindow {
        TimeWindow::days_from(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(), 5).unwrap()
    }

    #[test]
    fn calendar_events_default_reminder() {
        let batch = CalendarEvents::new("primary", vec![]);
        assert_eq!(batch.default_reminder_or(10), 10);

        let batch = batch.with_default_reminder(30);
        assert_eq!(batch.default_reminder_or(10), 30);
    }

    #[test]
    fn fetch_options_expand_by_default() {
        let options = FetchOptions::new(window());
        assert!(options.single_events);
        assert!(!options.with_single_events(false).single_events);
    }

    #[tokio::test]
    async fn error_provider_returns_error() {
        let provider = ErrorProvider::new("test", ProviderError::configuration("not configured"));

        assert_eq!(provider.name(), "test");
        assert!(!provider.is_authenticated());

        let options = FetchOptions::new(window());
        let err = provider.fetch_calendar("primary", &options).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert_eq!(err.provider(), Some("test"));
        assert_eq!(err.calendar_id(), Some("primary"));

        assert!(provider.refresh_auth().await.is_err());
    }
}

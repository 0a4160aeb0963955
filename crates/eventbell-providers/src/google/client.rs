//! Google Calendar API v3 client.
//!
//! A thin HTTP layer over `events.list`: builds the query, follows
//! `nextPageToken`, and maps HTTP failures onto [`ProviderErrorCode`]s.
//!
//! [`ProviderErrorCode`]: crate::ProviderErrorCode

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use eventbell_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::CalendarEvents;
use crate::raw_event::{RawEvent, RawReminder};

/// Base URL for Google Calendar API v3.
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// Upper bound on pages followed for one calendar in one cycle.
const MAX_PAGES: usize = 50;

/// One page of an `events.list` response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
    #[serde(default)]
    default_reminders: Vec<RawReminder>,
    next_page_token: Option<String>,
}

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: Url,
    developer_key: Option<String>,
}

impl GoogleCalendarClient {
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        developer_key: Option<String>,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::internal("failed to build HTTP client").with_source(e))?;

        let base_url = Url::parse(CALENDAR_API_BASE)
            .map_err(|e| ProviderError::internal("invalid API base URL").with_source(e))?;

        Ok(Self {
            http_client,
            base_url,
            developer_key,
        })
    }

    /// Points the client at another API root (must end with `/`).
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Returns the `events.list` URL for a calendar.
    pub fn events_url(&self, calendar_id: &str) -> ProviderResult<Url> {
        let path = format!("calendars/{}/events", urlencoding::encode(calendar_id));
        self.base_url
            .join(&path)
            .map_err(|e| ProviderError::bad_request("invalid calendar id").with_source(e))
    }

    /// Lists the events of one calendar inside the window, across all pages.
    ///
    /// The calendar's default reminder is taken from the first page's
    /// `defaultReminders`.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
        single_events: bool,
    ) -> ProviderResult<CalendarEvents> {
        let url = self.events_url(calendar_id)?;
        let mut events = Vec::new();
        let mut default_reminder = None;
        let mut page_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let response = self
                .list_events_page(
                    &url,
                    access_token,
                    window,
                    single_events,
                    page_token.as_deref(),
                )
                .await
                .map_err(|e| e.with_calendar(calendar_id))?;

            if page == 0 {
                default_reminder = response
                    .default_reminders
                    .first()
                    .and_then(|r| r.minutes);
            }
            events.extend(response.items);

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "fetched events");

        let mut batch = CalendarEvents::new(calendar_id, events);
        batch.default_reminder_minutes = default_reminder;
        Ok(batch)
    }

    async fn list_events_page(
        &self,
        url: &Url,
        access_token: &str,
        window: &TimeWindow,
        single_events: bool,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let mut request = self
            .http_client
            .get(url.clone())
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", single_events.to_string()),
            ]);

        if let Some(key) = self.developer_key.as_deref() {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request timed out"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            ProviderError::network(message).with_source(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network("failed to read response body").with_source(e)
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response("failed to parse events response").with_source(e)
        })
    }
}

/// Maps a non-success HTTP status onto a provider error.
fn status_error(status: StatusCode, body: &str) -> ProviderError {
    let detail = api_error_message(body).unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::UNAUTHORIZED => {
            ProviderError::authentication(format!("access token rejected: {detail}"))
        }
        StatusCode::FORBIDDEN => ProviderError::authorization(detail),
        StatusCode::NOT_FOUND => ProviderError::not_found(detail),
        StatusCode::BAD_REQUEST => ProviderError::bad_request(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(detail),
        s if s.is_server_error() => ProviderError::server(format!("{s}: {detail}")),
        s => ProviderError::invalid_response(format!("unexpected status {s}: {detail}")),
    }
}

/// Extracts `error.message` from a Google API error body.
fn api_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::{TimeZone, Utc};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> GoogleCalendarClient {
        GoogleCalendarClient::new(Duration::from_secs(5), "eventbell-test", None).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::days_from(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(), 5).unwrap()
    }

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "kind": "calendar#events",
            "defaultReminders": [
                { "method": "popup", "minutes": 30 },
                { "method": "email", "minutes": 60 }
            ],
            "items": [
                {
                    "id": "event1",
                    "summary": "Team Meeting",
                    "start": { "dateTime": "2024-01-01T10:00:00Z" },
                    "end": { "dateTime": "2024-01-01T11:00:00Z" }
                }
            ],
            "nextPageToken": "page2"
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].summary.as_deref(), Some("Team Meeting"));
        assert_eq!(response.default_reminders[0].minutes, Some(30));
        assert_eq!(response.next_page_token.as_deref(), Some("page2"));
    }

    #[test]
    fn parse_empty_response() {
        let response: EventListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
        assert!(response.default_reminders.is_empty());
    }

    #[test]
    fn events_url_encodes_calendar_id() {
        let url = client().events_url("team@group.calendar.google.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%40group.calendar.google.com/events"
        );
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#;
        let err = status_error(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert!(err.message().contains("Invalid Credentials"));

        let cases = [
            (StatusCode::FORBIDDEN, ProviderErrorCode::AuthorizationFailed),
            (StatusCode::NOT_FOUND, ProviderErrorCode::NotFound),
            (StatusCode::BAD_REQUEST, ProviderErrorCode::BadRequest),
            (StatusCode::TOO_MANY_REQUESTS, ProviderErrorCode::RateLimited),
            (StatusCode::BAD_GATEWAY, ProviderErrorCode::ServerError),
            (StatusCode::IM_A_TEAPOT, ProviderErrorCode::InvalidResponse),
        ];
        for (status, code) in cases {
            assert_eq!(status_error(status, "").code(), code, "{status}");
        }
    }

    /// Serves canned JSON pages: the second page when the request asks for it.
    async fn serve_pages(listener: TcpListener, first: &'static str, second: &'static str) {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 8192];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let body = if request.contains("pageToken=p2") {
                second
            } else {
                first
            };
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }

    #[tokio::test]
    async fn list_events_follows_pages() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_pages(
            listener,
            r#"{"defaultReminders":[{"method":"popup","minutes":15}],"items":[{"id":"a"}],"nextPageToken":"p2"}"#,
            r#"{"items":[{"id":"b"}]}"#,
        ));

        let base = Url::parse(&format!("http://{addr}/calendar/v3/")).unwrap();
        let client = client().with_base_url(base);

        let batch = client
            .list_events("token", "primary", &window(), true)
            .await
            .unwrap();

        assert_eq!(batch.calendar_id, "primary");
        assert_eq!(batch.default_reminder_minutes, Some(15));
        let ids: Vec<_> = batch.events.iter().filter_map(|e| e.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn list_events_connection_refused_is_network_error() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        let err = client()
            .with_base_url(base)
            .list_events("token", "primary", &window(), true)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
        assert_eq!(err.calendar_id(), Some("primary"));
    }
}

//! Raw event types as returned by calendar providers.
//!
//! [`RawEvent`] mirrors the Google Calendar `Event` resource closely enough
//! to be deserialized straight from an `events.list` response. Every field is
//! optional: the provider may omit anything, and the normalizer decides what
//! is usable.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Start or end time of a raw event.
///
/// Timed events carry `dateTime` (RFC 3339 with offset); all-day events carry
/// only `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventTime {
    /// RFC 3339 timestamp, e.g. `2024-01-01T09:15:00-08:00`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// Calendar date for all-day events, e.g. `2024-01-01`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// IANA timezone the event was created in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl RawEventTime {
    /// Creates a timed value from an RFC 3339 string.
    pub fn from_date_time(value: impl Into<String>) -> Self {
        Self {
            date_time: Some(value.into()),
            ..Self::default()
        }
    }

    /// Creates an all-day value from a `YYYY-MM-DD` string.
    pub fn from_date(value: impl Into<String>) -> Self {
        Self {
            date: Some(value.into()),
            ..Self::default()
        }
    }

    /// Returns true if this time has no concrete date-time.
    pub fn is_all_day(&self) -> bool {
        self.date_time.is_none()
    }

    /// Parses the date-time, keeping its original offset.
    ///
    /// Returns `None` for all-day values and for unparseable strings.
    pub fn parse_date_time(&self) -> Option<DateTime<FixedOffset>> {
        self.date_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    /// Parses the all-day date, if present and well formed.
    pub fn parse_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }
}

/// A single reminder setting: an override on an event, or a calendar default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReminder {
    /// Delivery method, e.g. `popup` or `email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Minutes before the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
}

impl RawReminder {
    /// Creates a reminder with the given method and minutes.
    pub fn new(method: impl Into<String>, minutes: i64) -> Self {
        Self {
            method: Some(method.into()),
            minutes: Some(minutes),
        }
    }

    /// Creates a popup reminder.
    pub fn popup(minutes: i64) -> Self {
        Self::new("popup", minutes)
    }

    /// Returns true if this reminder is delivered as a popup.
    pub fn is_popup(&self) -> bool {
        self.method.as_deref() == Some("popup")
    }
}

/// Reminder settings attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReminders {
    /// Whether the calendar's default reminders apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_default: Option<bool>,
    /// Event-specific reminders, in the order the provider returned them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<RawReminder>,
}

/// A raw calendar event from a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The event title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `confirmed`, `tentative` or `cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<RawEventTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<RawEventTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<RawReminders>,

    /// Set on instances of an expanded recurring series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_event_id: Option<String>,
}

impl RawEvent {
    /// Creates an empty raw event with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Builder method to set a timed start and end from RFC 3339 strings.
    pub fn with_times(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start = Some(RawEventTime::from_date_time(start));
        self.end = Some(RawEventTime::from_date_time(end));
        self
    }

    /// Builder method to set an all-day span from `YYYY-MM-DD` strings.
    pub fn with_dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start = Some(RawEventTime::from_date(start));
        self.end = Some(RawEventTime::from_date(end));
        self
    }

    /// Builder method to set reminder settings.
    pub fn with_reminders(mut self, use_default: bool, overrides: Vec<RawReminder>) -> Self {
        self.reminders = Some(RawReminders {
            use_default: Some(use_default),
            overrides,
        });
        self
    }

    /// Returns true if the event is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"))
    }

    /// Returns true if the event has no concrete start date-time.
    pub fn is_all_day(&self) -> bool {
        self.start.as_ref().is_none_or(RawEventTime::is_all_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_google_event_json() {
        let json = r#"{
            "id": "abc123",
            "summary": "Café Meeting",
            "description": "Repeat",
            "status": "confirmed",
            "start": { "dateTime": "2024-01-01T09:00:00-08:00", "timeZone": "America/Los_Angeles" },
            "end": { "dateTime": "2024-01-01T09:30:00-08:00" },
            "reminders": {
                "useDefault": false,
                "overrides": [
                    { "method": "email", "minutes": 60 },
                    { "method": "popup", "minutes": 10 }
                ]
            },
            "htmlLink": "https://www.google.com/calendar/event?eid=abc"
        }"#;

        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id.as_deref(), Some("abc123"));
        assert_eq!(event.summary.as_deref(), Some("Café Meeting"));
        assert!(!event.is_all_day());

        let reminders = event.reminders.unwrap();
        assert_eq!(reminders.use_default, Some(false));
        assert_eq!(reminders.overrides.len(), 2);
        assert!(!reminders.overrides[0].is_popup());
        assert!(reminders.overrides[1].is_popup());
    }

    #[test]
    fn all_day_event() {
        let event = RawEvent::new("evt").with_dates("2024-01-01", "2024-01-02");
        assert!(event.is_all_day());
        let start = event.start.unwrap();
        assert!(start.parse_date_time().is_none());
        assert_eq!(
            start.parse_date(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn missing_start_counts_as_all_day() {
        assert!(RawEvent::new("evt").is_all_day());
    }

    #[test]
    fn parse_keeps_offset() {
        let time = RawEventTime::from_date_time("2024-01-01T09:15:42-08:00");
        let parsed = time.parse_date_time().unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn malformed_date_time_parses_to_none() {
        let time = RawEventTime::from_date_time("tomorrow morning");
        assert!(time.parse_date_time().is_none());
    }

    #[test]
    fn cancelled_status() {
        assert!(RawEvent::new("evt").with_status("cancelled").is_cancelled());
        assert!(RawEvent::new("evt").with_status("CANCELLED").is_cancelled());
        assert!(!RawEvent::new("evt").with_status("confirmed").is_cancelled());
        assert!(!RawEvent::new("evt").is_cancelled());
    }
}

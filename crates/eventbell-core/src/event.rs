//! The normalized event record used by trigger evaluation.

use serde::{Deserialize, Serialize};

use crate::time::Minute;

/// A flat, comparable view of a calendar event.
///
/// Built from a provider's raw event once per poll cycle and discarded
/// afterwards; nothing here outlives a single iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Provider identifier of the event (may be empty if the source omitted it).
    pub id: String,
    /// The calendar the event was fetched from.
    pub calendar_id: String,
    /// Lowercased ASCII-folded summary.
    pub name: String,
    /// End of the event, truncated to the minute.
    pub end_minute: Minute,
    /// How many minutes before `end_minute` the reminder fires.
    pub reminder_offset_minutes: i64,
    /// Whether the reminder may fire on every matching tick.
    pub repeat: bool,
}

impl NormalizedEvent {
    /// Creates a new normalized event with `repeat` unset.
    pub fn new(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        name: impl Into<String>,
        end_minute: Minute,
        reminder_offset_minutes: i64,
    ) -> Self {
        Self {
            id: id.into(),
            calendar_id: calendar_id.into(),
            name: name.into(),
            end_minute,
            reminder_offset_minutes,
            repeat: false,
        }
    }

    /// Builder method to set the repeat flag.
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Returns the minute at which this event's reminder is due, or `None`
    /// if the offset pushes it outside the representable date range.
    pub fn trigger_minute(&self) -> Option<Minute> {
        self.reminder_offset_minutes
            .checked_neg()
            .and_then(|offset| self.end_minute.plus_minutes(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn minute(h: u32, m: u32) -> Minute {
        Minute::from_utc(Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap())
    }

    #[test]
    fn builder() {
        let event = NormalizedEvent::new("evt-1", "primary", "standup", minute(9, 15), 15)
            .with_repeat(true);

        assert_eq!(event.id, "evt-1");
        assert_eq!(event.calendar_id, "primary");
        assert_eq!(event.name, "standup");
        assert!(event.repeat);
    }

    #[test]
    fn trigger_minute_subtracts_offset() {
        let event = NormalizedEvent::new("evt-1", "primary", "standup", minute(9, 15), 15);
        assert_eq!(event.trigger_minute(), Some(minute(9, 0)));

        let zero = NormalizedEvent::new("evt-2", "primary", "now", minute(9, 15), 0);
        assert_eq!(zero.trigger_minute(), Some(minute(9, 15)));
    }

    #[test]
    fn trigger_minute_out_of_range_is_none() {
        let huge = NormalizedEvent::new("evt-1", "primary", "far", minute(9, 15), 10_000_000_000_000);
        assert_eq!(huge.trigger_minute(), None);

        let min = NormalizedEvent::new("evt-2", "primary", "far", minute(9, 15), i64::MIN);
        assert_eq!(min.trigger_minute(), None);
    }

    #[test]
    fn serde_roundtrip() {
        let event = NormalizedEvent::new("evt-1", "primary", "cafe", minute(9, 15), 10);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: NormalizedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}

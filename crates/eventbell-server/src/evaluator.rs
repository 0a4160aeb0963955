//! Trigger evaluation.
//!
//! An event fires when `now + offset`, truncated to the minute, is exactly
//! its end minute. This is a point match, not a range: a cycle that misses
//! the minute misses the reminder.

use chrono::{DateTime, TimeDelta, Utc};

use eventbell_core::{Minute, NormalizedEvent};

/// Returns true if the event's reminder is due at `now`.
pub fn should_fire(event: &NormalizedEvent, now: DateTime<Utc>) -> bool {
    TimeDelta::try_minutes(event.reminder_offset_minutes)
        .and_then(|offset| now.checked_add_signed(offset))
        .is_some_and(|expiration| Minute::from_utc(expiration) == event.end_minute)
}

/// Returns the events due at `now`, in their original order.
pub fn due_events(events: &[NormalizedEvent], now: DateTime<Utc>) -> Vec<&NormalizedEvent> {
    events.iter().filter(|e| should_fire(e, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    fn event(id: &str, end: DateTime<Utc>, offset: i64) -> NormalizedEvent {
        NormalizedEvent::new(id, "primary", id, Minute::from_utc(end), offset)
    }

    #[test]
    fn fires_on_exact_minute() {
        let now = at(9, 0, 0);
        assert!(should_fire(&event("a", at(9, 15, 0), 15), now));
        assert!(!should_fire(&event("b", at(9, 16, 0), 15), now));
        assert!(!should_fire(&event("c", at(9, 14, 0), 15), now));
    }

    #[test]
    fn seconds_within_the_minute_still_match() {
        let e = event("a", at(9, 15, 0), 15);
        assert!(should_fire(&e, at(9, 0, 59)));
        assert!(!should_fire(&e, at(9, 1, 0)));
    }

    #[test]
    fn zero_offset_fires_at_end() {
        assert!(should_fire(&event("a", at(9, 15, 0), 0), at(9, 15, 30)));
    }

    #[test]
    fn independent_of_local_offset() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let end = tokyo.with_ymd_and_hms(2024, 1, 1, 18, 15, 0).unwrap();
        let e = NormalizedEvent::new("a", "primary", "a", Minute::from_local(end), 15);
        assert!(should_fire(&e, at(9, 0, 0)));
    }

    #[test]
    fn absurd_offset_does_not_fire() {
        assert!(!should_fire(&event("a", at(9, 15, 0), i64::MAX), at(9, 0, 0)));
    }

    #[test]
    fn due_events_keeps_order() {
        let now = at(9, 0, 0);
        let events = vec![
            event("first", at(9, 10, 0), 10),
            event("skip", at(9, 30, 0), 10),
            event("second", at(9, 5, 0), 5),
        ];
        let due: Vec<_> = due_events(&events, now).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(due, vec!["first", "second"]);
    }
}

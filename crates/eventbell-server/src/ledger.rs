//! In-memory record of reminders already fired.
//!
//! Several poll cycles fall inside one trigger minute (30 s interval, 60 s
//! minute), so without a ledger every one of them fires. The ledger keys each
//! firing by a SHA-256 of calendar, event id, end minute and offset; a key
//! fires once. Events marked `repeat` are never recorded.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use eventbell_core::NormalizedEvent;

/// Returns the ledger key for an event's trigger.
pub fn firing_key(event: &NormalizedEvent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.calendar_id.as_bytes());
    hasher.update([0]);
    hasher.update(event.id.as_bytes());
    hasher.update([0]);
    hasher.update(event.end_minute.timestamp().to_le_bytes());
    hasher.update(event.reminder_offset_minutes.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Set of fired triggers with the time each was recorded.
#[derive(Debug)]
pub struct FiringLedger {
    fired: HashMap<String, DateTime<Utc>>,
    retention: TimeDelta,
}

impl Default for FiringLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FiringLedger {
    /// Creates a ledger that forgets entries after one day.
    pub fn new() -> Self {
        Self::with_retention(TimeDelta::days(1))
    }

    pub fn with_retention(retention: TimeDelta) -> Self {
        Self {
            fired: HashMap::new(),
            retention,
        }
    }

    /// Returns true if the event should fire now, recording it if so.
    pub fn admit(&mut self, event: &NormalizedEvent, now: DateTime<Utc>) -> bool {
        if event.repeat {
            return true;
        }
        let key = firing_key(event);
        if self.fired.contains_key(&key) {
            debug!(event = %event.name, "already fired for this trigger");
            return false;
        }
        self.fired.insert(key, now);
        true
    }

    /// Drops entries recorded more than the retention period before `now`.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        let before = self.fired.len();
        self.fired.retain(|_, at| *at >= cutoff);
        let removed = before - self.fired.len();
        if removed > 0 {
            debug!(removed, remaining = self.fired.len(), "pruned firing ledger");
        }
    }

    /// Number of triggers currently remembered.
    pub fn remembered(&self) -> usize {
        self.fired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use eventbell_core::Minute;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn event(id: &str) -> NormalizedEvent {
        NormalizedEvent::new(id, "primary", "standup", Minute::from_utc(now()), 15)
    }

    #[test]
    fn key_is_stable_hex() {
        let key = firing_key(&event("a"));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, firing_key(&event("a")));
    }

    #[test]
    fn key_depends_on_every_component() {
        let base = event("a");
        let mut other_calendar = base.clone();
        other_calendar.calendar_id = "work".into();
        let mut other_offset = base.clone();
        other_offset.reminder_offset_minutes = 5;
        let mut other_end = base.clone();
        other_end.end_minute = base.end_minute.plus_minutes(1).unwrap();

        for other in [event("b"), other_calendar, other_offset, other_end] {
            assert_ne!(firing_key(&base), firing_key(&other));
        }
    }

    #[test]
    fn non_repeat_fires_once() {
        let mut ledger = FiringLedger::new();
        assert!(ledger.admit(&event("a"), now()));
        assert!(!ledger.admit(&event("a"), now()));
        assert!(ledger.admit(&event("b"), now()));
        assert_eq!(ledger.remembered(), 2);
    }

    #[test]
    fn repeat_always_fires_and_is_not_recorded() {
        let mut ledger = FiringLedger::new();
        let e = event("a").with_repeat(true);
        assert!(ledger.admit(&e, now()));
        assert!(ledger.admit(&e, now()));
        assert_eq!(ledger.remembered(), 0);
    }

    #[test]
    fn prune_drops_old_entries() {
        let mut ledger = FiringLedger::new();
        ledger.admit(&event("old"), now());
        ledger.admit(&event("new"), now() + TimeDelta::hours(20));

        ledger.prune(now() + TimeDelta::hours(25));
        assert_eq!(ledger.remembered(), 1);
        assert!(!ledger.admit(&event("new"), now() + TimeDelta::hours(25)));
        assert!(ledger.admit(&event("old"), now() + TimeDelta::hours(25)));
    }
}

//! RawEvent to NormalizedEvent conversion.
//!
//! The normalizer flattens a provider [`RawEvent`] into the few fields the
//! trigger evaluator compares on:
//! 1. The summary, lowercased and folded to ASCII
//! 2. The end time, converted to UTC and truncated to the minute
//! 3. The reminder offset, from the first popup override or the calendar default
//! 4. The repeat flag, from a description of exactly "repeat"
//!
//! Nothing here fails: events that cannot be used are skipped with a trace line.

use eventbell_core::{Minute, NormalizedEvent, eq_keyword, fold_to_ascii};
use tracing::{debug, warn};

use crate::provider::CalendarEvents;
use crate::raw_event::{RawEvent, RawReminders};

/// Description value that marks an event as repeating.
const REPEAT_KEYWORD: &str = "repeat";

/// Converts a [`RawEvent`] to a [`NormalizedEvent`].
///
/// Returns `None` when the event has no summary, no start, no concrete start
/// date-time (all-day events), no parseable end date-time, or is cancelled.
///
/// # Arguments
///
/// * `raw` - The raw event from a calendar provider
/// * `calendar_id` - The calendar the event was fetched from
/// * `default_minutes` - The reminder offset used when the event has no popup override
pub fn normalize_event(
    raw: &RawEvent,
    calendar_id: &str,
    default_minutes: i64,
) -> Option<NormalizedEvent> {
    let id = raw.id.as_deref().unwrap_or_default();

    if raw.is_cancelled() {
        debug!(event_id = id, calendar_id, "skipping cancelled event");
        return None;
    }

    let Some(summary) = raw.summary.as_deref() else {
        debug!(event_id = id, calendar_id, "skipping event without summary");
        return None;
    };

    if raw.is_all_day() {
        debug!(event_id = id, calendar_id, "skipping all-day event");
        return None;
    }

    let Some(end) = raw.end.as_ref().and_then(|end| end.parse_date_time()) else {
        warn!(
            event_id = id,
            calendar_id, "skipping event without a parseable end time"
        );
        return None;
    };

    let offset = reminder_offset(raw.reminders.as_ref(), default_minutes);
    let repeat = raw
        .description
        .as_deref()
        .is_some_and(|d| eq_keyword(d, REPEAT_KEYWORD));

    Some(
        NormalizedEvent::new(
            id,
            calendar_id,
            fold_to_ascii(summary),
            Minute::from_local(end),
            offset,
        )
        .with_repeat(repeat),
    )
}

/// Picks the reminder offset for an event.
///
/// An explicit popup override wins only when the event opts out of the
/// calendar defaults; a missing `useDefault` counts as opting in.
fn reminder_offset(reminders: Option<&RawReminders>, default_minutes: i64) -> i64 {
    let Some(reminders) = reminders else {
        return default_minutes;
    };
    if reminders.use_default.unwrap_or(true) {
        return default_minutes;
    }
    reminders
        .overrides
        .iter()
        .filter(|r| r.is_popup())
        .find_map(|r| r.minutes)
        .unwrap_or(default_minutes)
}

/// Normalizes every event of one calendar.
///
/// The calendar's own default reminder applies to its events; `fallback_minutes`
/// is used when the calendar reports none. Source order is preserved.
pub fn normalize_calendar(batch: &CalendarEvents, fallback_minutes: i64) -> Vec<NormalizedEvent> {
    let default_minutes = batch.default_reminder_or(fallback_minutes);
    batch
        .events
        .iter()
        .filter_map(|raw| normalize_event(raw, &batch.calendar_id, default_minutes))
        .collect()
}

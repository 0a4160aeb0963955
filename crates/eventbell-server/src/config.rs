//! Poll loop configuration.

use std::time::Duration;

use crate::error::{ServerError, ServerResult};

/// Longest query window accepted, in days.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Poll loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Calendars queried each cycle, in order.
    pub calendars: Vec<String>,

    /// Reminder offset for calendars that report no default of their own.
    pub default_reminder_minutes: i64,

    /// Fixed sleep between cycles, also used after a failed cycle.
    pub poll_interval: Duration,

    /// Length of the query window, starting now.
    pub window_days: i64,

    /// Fire non-repeating events at most once per trigger minute. Off by
    /// default: every matching tick fires.
    pub suppress_duplicates: bool,

    /// Stop after this many cycles. `None` runs until shutdown.
    pub max_cycles: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            calendars: Vec::new(),
            default_reminder_minutes: 10,
            poll_interval: Duration::from_secs(30),
            window_days: 5,
            suppress_duplicates: false,
            max_cycles: None,
        }
    }
}

impl PollConfig {
    /// Creates a configuration for the given calendars.
    pub fn new(calendars: Vec<String>) -> Self {
        Self {
            calendars,
            ..Default::default()
        }
    }

    /// Builder: set the fallback reminder offset.
    pub fn with_default_reminder_minutes(mut self, minutes: i64) -> Self {
        self.default_reminder_minutes = minutes;
        self
    }

    /// Builder: set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder: set the window length in days.
    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = days;
        self
    }

    /// Builder: toggle the firing ledger.
    pub fn with_suppress_duplicates(mut self, suppress: bool) -> Self {
        self.suppress_duplicates = suppress;
        self
    }

    /// Builder: stop after `cycles` cycles.
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Checks the configuration before the loop starts.
    pub fn validate(&self) -> ServerResult<()> {
        if self.calendars.is_empty() {
            return Err(ServerError::config("at least one calendar is required"));
        }
        if self.calendars.iter().any(|c| c.trim().is_empty()) {
            return Err(ServerError::config("calendar ids must not be empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(ServerError::config("poll interval must be positive"));
        }
        if self.window_days <= 0 {
            return Err(ServerError::config("window_days must be positive"));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(ServerError::config(format!(
                "window_days must be at most {MAX_WINDOW_DAYS}"
            )));
        }
        if self.default_reminder_minutes < 0 {
            return Err(ServerError::config(
                "default reminder minutes must not be negative",
            ));
        }
        Ok(())
    }
}

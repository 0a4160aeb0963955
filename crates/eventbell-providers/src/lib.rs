//! CalendarProvider trait, raw events, and the event normalizer.
//!
//! - [`CalendarProvider`] - The trait calendar sources implement
//! - [`RawEvent`] - Event data as the source returns it
//! - [`normalize_calendar`] - Flattens a calendar's events for trigger evaluation
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Google API     │
//! └────────┬────────┘
//!          │ events.list (per calendar)
//!          ▼
//! ┌─────────────────┐
//! │ GoogleProvider  │  CalendarProvider
//! └────────┬────────┘
//!          │
//!          ▼
//!   ┌────────────────┐
//!   │ CalendarEvents │  RawEvents + the calendar's default reminder
//!   └───────┬────────┘
//!           │ normalize_calendar()
//!           ▼
//!   ┌──────────────────┐
//!   │ NormalizedEvent  │
//!   └──────────────────┘
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod normalize;
pub mod provider;
pub mod raw_event;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use normalize::{normalize_calendar, normalize_event};
pub use provider::{BoxFuture, CalendarEvents, CalendarProvider, ErrorProvider, FetchOptions};
pub use raw_event::{RawEvent, RawEventTime, RawReminder, RawReminders};

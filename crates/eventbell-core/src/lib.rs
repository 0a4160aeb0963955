//! Core types: minute-resolution time, normalized events, text folding, tracing

pub mod event;
pub mod text;
pub mod time;
pub mod tracing;

pub use event::NormalizedEvent;
pub use text::{eq_keyword, fold_to_ascii};
pub use time::{Minute, TimeWindow, truncate_to_minute};
pub use tracing::{
    TracingConfig, TracingError, TracingGuard, TracingOutputFormat, init_tracing,
};

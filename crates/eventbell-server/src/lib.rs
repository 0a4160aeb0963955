//! Poll loop, trigger evaluation and reminder actuators.
//!
//! This crate drives the reminder daemon:
//! - Polling the configured calendars on a fixed interval
//! - Deciding which events are due this minute
//! - Suppressing repeat firings of the same trigger
//! - Firing an actuator (log line, desktop notification, command, GPIO)
//!
//! # Example
//!
//! ```rust,no_run
//! use eventbell_providers::{ErrorProvider, ProviderError};
//! use eventbell_server::{AppContext, LogActuator, PollConfig, PollLoop, SignalHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PollConfig::new(vec!["primary".to_string()]);
//!     let provider = ErrorProvider::new("demo", ProviderError::network("offline"));
//!     let ctx = AppContext::new(config, Box::new(provider), Box::new(LogActuator));
//!
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!     PollLoop::new(ctx)
//!         .with_shutdown(signals.shutdown_handle())
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

mod actuator;
mod config;
mod error;
mod evaluator;
mod ledger;
mod poll_loop;
mod signals;

pub use actuator::{
    Actuator, CommandActuator, DesktopActuator, GpioActuator, LogActuator, NAME_PLACEHOLDER,
};
pub use config::{MAX_WINDOW_DAYS, PollConfig};
pub use error::{ErrorKind, Recovery, ServerError, ServerResult};
pub use evaluator::{due_events, should_fire};
pub use ledger::{FiringLedger, firing_key};
pub use poll_loop::{
    AppContext, Clock, CycleReport, Evaluation, LoopExit, LoopPhase, PollLoop, SystemClock,
};
pub use signals::{ShutdownHandle, SignalHandler};

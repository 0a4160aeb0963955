//! The poll loop: fetch, normalize, evaluate, fire, sleep.
//!
//! Every cycle queries each configured calendar in order over a window
//! starting now, normalizes the events with that calendar's own default
//! reminder, and fires the actuator for each due event. A failed cycle is
//! handled according to its [`ErrorKind`](crate::ErrorKind):
//!
//! - network and data errors are logged and retried after the fixed interval
//! - an auth error triggers one credential refresh; a second auth failure
//!   before a successful cycle is fatal
//! - config errors stop the loop
//!
//! The sleep between cycles is interrupted by shutdown.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use eventbell_core::{NormalizedEvent, TimeWindow};
use eventbell_providers::{CalendarProvider, FetchOptions, normalize_calendar};

use crate::actuator::Actuator;
use crate::config::PollConfig;
use crate::error::{Recovery, ServerError, ServerResult};
use crate::evaluator::due_events;
use crate::ledger::FiringLedger;
use crate::signals::ShutdownHandle;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything the loop needs, built once at startup.
pub struct AppContext {
    pub config: PollConfig,
    pub provider: Box<dyn CalendarProvider>,
    pub actuator: Box<dyn Actuator>,
    pub clock: Box<dyn Clock>,
}

impl AppContext {
    /// Creates a context using the wall clock.
    pub fn new(
        config: PollConfig,
        provider: Box<dyn CalendarProvider>,
        actuator: Box<dyn Actuator>,
    ) -> Self {
        Self {
            config,
            provider,
            actuator,
            clock: Box::new(SystemClock),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("actuator", &self.actuator.name())
            .finish_non_exhaustive()
    }
}

/// Where the loop is; only used as a trace field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Fetching,
    Evaluating,
    Sleeping,
    Recovering,
}

impl LoopPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Evaluating => "evaluating",
            Self::Sleeping => "sleeping",
            Self::Recovering => "recovering",
        }
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one cycle, before anything fires.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Every usable event across all calendars, in fetch order.
    pub events: Vec<NormalizedEvent>,
    /// The subset due now.
    pub due: Vec<NormalizedEvent>,
}

/// What a completed cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub due: usize,
    pub fired: usize,
    pub suppressed: usize,
    pub failed: usize,
    /// Triggers held by the firing ledger after this cycle, if it is on.
    pub remembered: Option<usize>,
}

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    MaxCycles,
}

/// Drives the fetch/evaluate/fire cycle on a fixed cadence.
#[derive(Debug)]
pub struct PollLoop {
    ctx: AppContext,
    ledger: Option<FiringLedger>,
    shutdown: Option<ShutdownHandle>,
    cycles: u64,
}

impl PollLoop {
    pub fn new(ctx: AppContext) -> Self {
        let ledger = ctx.config.suppress_duplicates.then(FiringLedger::new);
        Self {
            ctx,
            ledger,
            shutdown: None,
            cycles: 0,
        }
    }

    /// Stops the loop when `handle` is triggered.
    pub fn with_shutdown(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = Some(handle);
        self
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Fetches every calendar and evaluates its events at `now`.
    ///
    /// The first failing calendar aborts the evaluation.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> ServerResult<Evaluation> {
        let config = &self.ctx.config;
        let window = TimeWindow::days_from(now, config.window_days).ok_or_else(|| {
            ServerError::config(format!(
                "a {}-day window from {now} is out of range",
                config.window_days
            ))
        })?;
        let options = FetchOptions::new(window);

        let mut events = Vec::new();
        for calendar_id in &config.calendars {
            debug!(calendar_id = %calendar_id, phase = %LoopPhase::Fetching, "querying calendar");
            let batch = self
                .ctx
                .provider
                .fetch_calendar(calendar_id, &options)
                .await?;
            events.extend(normalize_calendar(&batch, config.default_reminder_minutes));
        }

        debug!(count = events.len(), phase = %LoopPhase::Evaluating, "evaluating events");
        let due = due_events(&events, now).into_iter().cloned().collect();
        Ok(Evaluation { events, due })
    }

    /// Runs one cycle: evaluate, then fire the actuator for every due event
    /// the ledger admits.
    pub async fn run_cycle(&mut self) -> ServerResult<CycleReport> {
        let now = self.ctx.clock.now();
        let evaluation = self.evaluate(now).await?;

        let mut report = CycleReport {
            events: evaluation.events.len(),
            due: evaluation.due.len(),
            ..CycleReport::default()
        };

        if let Some(ledger) = self.ledger.as_mut() {
            ledger.prune(now);
        }

        for event in &evaluation.due {
            let admitted = match self.ledger.as_mut() {
                Some(ledger) => ledger.admit(event, now),
                None => true,
            };
            if !admitted {
                report.suppressed += 1;
                continue;
            }

            match self.ctx.actuator.fire(event).await {
                Ok(()) => {
                    info!(
                        event = %event.name,
                        calendar = %event.calendar_id,
                        offset = event.reminder_offset_minutes,
                        actuator = self.ctx.actuator.name(),
                        "reminder fired"
                    );
                    report.fired += 1;
                }
                Err(e) => {
                    warn!(
                        event = %event.name,
                        actuator = self.ctx.actuator.name(),
                        error = %e.describe(),
                        "actuator failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report.remembered = self.ledger.as_ref().map(FiringLedger::remembered);
        Ok(report)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.as_ref().is_some_and(ShutdownHandle::is_shutdown)
    }

    fn reached_max_cycles(&self) -> bool {
        self.ctx.config.max_cycles.is_some_and(|max| self.cycles >= max)
    }

    /// Sleeps the poll interval. Returns false if shutdown cut the sleep short.
    async fn sleep(&self) -> bool {
        let interval = self.ctx.config.poll_interval;
        debug!(secs = interval.as_secs(), phase = %LoopPhase::Sleeping, "sleeping");
        match &self.shutdown {
            Some(handle) => tokio::select! {
                _ = tokio::time::sleep(interval) => true,
                _ = handle.wait() => false,
            },
            None => {
                tokio::time::sleep(interval).await;
                true
            }
        }
    }

    /// Runs until shutdown, `max_cycles`, or a fatal error.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the loop: a config error, or an auth
    /// error that a refresh could not fix.
    pub async fn run(mut self) -> ServerResult<LoopExit> {
        self.ctx.config.validate()?;
        info!(
            calendars = ?self.ctx.config.calendars,
            interval_secs = self.ctx.config.poll_interval.as_secs(),
            actuator = self.ctx.actuator.name(),
            phase = %LoopPhase::Idle,
            "poll loop started"
        );

        // Set after a refresh, cleared by the next successful cycle.
        let mut refreshed = false;

        loop {
            if self.is_shutdown() {
                info!(cycles = self.cycles, "poll loop stopped by shutdown");
                return Ok(LoopExit::Shutdown);
            }

            self.cycles += 1;
            match self.run_cycle().await {
                Ok(report) => {
                    refreshed = false;
                    debug!(cycle = self.cycles, ?report, "cycle complete");
                }
                Err(e) => {
                    let kind = e.kind();
                    match kind.recovery() {
                        Recovery::Retry => {
                            warn!(
                                cycle = self.cycles,
                                kind = %kind,
                                error = %e.describe(),
                                phase = %LoopPhase::Recovering,
                                "cycle failed, retrying after interval"
                            );
                        }
                        Recovery::RefreshAuth if !refreshed => {
                            warn!(
                                cycle = self.cycles,
                                error = %e.describe(),
                                phase = %LoopPhase::Recovering,
                                "credential rejected, refreshing"
                            );
                            refreshed = self.refresh_auth().await?;
                        }
                        Recovery::RefreshAuth | Recovery::Fatal => {
                            error!(kind = %kind, error = %e.describe(), "fatal error, stopping");
                            return Err(e);
                        }
                    }
                }
            }

            if self.reached_max_cycles() {
                info!(cycles = self.cycles, "poll loop reached max cycles");
                return Ok(LoopExit::MaxCycles);
            }

            if !self.sleep().await {
                info!(cycles = self.cycles, "poll loop stopped by shutdown");
                return Ok(LoopExit::Shutdown);
            }
        }
    }

    /// Refreshes the credential once. Returns whether it was refreshed.
    /// Auth and config failures are fatal; anything else is left for the
    /// next cycle to retry.
    async fn refresh_auth(&self) -> ServerResult<bool> {
        match self.ctx.provider.refresh_auth().await {
            Ok(()) => {
                info!("credential refreshed");
                Ok(true)
            }
            Err(e) => {
                let e = ServerError::from(e);
                match e.kind().recovery() {
                    Recovery::Retry => {
                        warn!(error = %e.describe(), "credential refresh failed, retrying later");
                        Ok(false)
                    }
                    Recovery::RefreshAuth | Recovery::Fatal => {
                        error!(error = %e.describe(), "credential refresh failed");
                        Err(e)
                    }
                }
            }
        }
    }
}

//! Reminder actuators.
//!
//! An [`Actuator`] signals that an event's reminder is due. Firing is
//! fire-and-forget: the poll loop logs a failure and moves on, and nothing
//! acknowledges that anyone noticed.
//!
//! - [`LogActuator`] writes a log line
//! - [`DesktopActuator`] shows a desktop notification
//! - [`CommandActuator`] spawns a program, e.g. an audio player
//! - [`GpioActuator`] blinks a GPIO line through its sysfs `value` file

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use eventbell_core::NormalizedEvent;
use eventbell_providers::BoxFuture;
use notify_rust::Notification;
#[cfg(target_os = "linux")]
use notify_rust::Urgency;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};

/// Placeholder replaced by the event name in command arguments.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Something that signals a due reminder.
pub trait Actuator: Send + Sync {
    /// Short name used in logs (e.g. "gpio").
    fn name(&self) -> &str;

    /// Signals the reminder for `event`.
    fn fire<'a>(&'a self, event: &'a NormalizedEvent) -> BoxFuture<'a, ServerResult<()>>;
}

/// Logs the reminder.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogActuator;

impl Actuator for LogActuator {
    fn name(&self) -> &str {
        "log"
    }

    fn fire<'a>(&'a self, event: &'a NormalizedEvent) -> BoxFuture<'a, ServerResult<()>> {
        Box::pin(async move {
            info!(
                event = %event.name,
                calendar = %event.calendar_id,
                end = %event.end_minute,
                "it's time"
            );
            Ok(())
        })
    }
}

/// Shows a desktop notification.
#[derive(Debug, Clone)]
pub struct DesktopActuator {
    app_name: String,
    timeout: Duration,
}

impl Default for DesktopActuator {
    fn default() -> Self {
        Self {
            app_name: "eventbell".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl DesktopActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn summary(event: &NormalizedEvent) -> String {
        match event.reminder_offset_minutes {
            0 => format!("{} ends now", event.name),
            1 => format!("{} ends in 1 minute", event.name),
            n => format!("{} ends in {} minutes", event.name, n),
        }
    }
}

impl Actuator for DesktopActuator {
    fn name(&self) -> &str {
        "desktop"
    }

    fn fire<'a>(&'a self, event: &'a NormalizedEvent) -> BoxFuture<'a, ServerResult<()>> {
        let mut notification = Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&Self::summary(event))
            .body(&format!("Ends at {}", event.end_minute))
            .timeout(self.timeout);

        #[cfg(target_os = "linux")]
        notification.urgency(Urgency::Critical);

        Box::pin(async move {
            // show() talks to the notification daemon synchronously.
            let shown = tokio::task::spawn_blocking(move || notification.show().map(|_| ()))
                .await
                .map_err(|e| {
                    ServerError::actuator_with_source("desktop", "notification task failed", e)
                })?;
            shown.map_err(|e| {
                ServerError::actuator_with_source("desktop", "failed to show notification", e)
            })?;
            debug!(event = %event.name, "notification shown");
            Ok(())
        })
    }
}

/// Spawns a program for each reminder without waiting for it.
#[derive(Debug, Clone)]
pub struct CommandActuator {
    program: String,
    args: Vec<String>,
}

impl CommandActuator {
    /// Creates an actuator from `argv`; the first element is the program.
    pub fn from_argv(argv: &[String]) -> ServerResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ServerError::config("actuator command must not be empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Returns the arguments with the event name substituted.
    pub fn render_args(&self, event: &NormalizedEvent) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(NAME_PLACEHOLDER, &event.name))
            .collect()
    }
}

impl Actuator for CommandActuator {
    fn name(&self) -> &str {
        "command"
    }

    fn fire<'a>(&'a self, event: &'a NormalizedEvent) -> BoxFuture<'a, ServerResult<()>> {
        Box::pin(async move {
            let child = tokio::process::Command::new(&self.program)
                .args(self.render_args(event))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| {
                    ServerError::actuator_with_source(
                        "command",
                        format!("failed to spawn {}", self.program),
                        e,
                    )
                })?;
            debug!(program = %self.program, pid = ?child.id(), "spawned reminder command");
            Ok(())
        })
    }
}

/// Blinks a GPIO line by writing `1`/`0` to its sysfs `value` file.
///
/// Blinks never overlap: a reminder that fires while the line is busy
/// waits for the running pattern to finish. Clones share the line.
#[derive(Debug, Clone)]
pub struct GpioActuator {
    value_path: PathBuf,
    pulses: u32,
    pulse: Duration,
    line: Arc<Mutex<()>>,
}

impl GpioActuator {
    /// BCM 14 through the legacy sysfs interface.
    pub const DEFAULT_VALUE_PATH: &'static str = "/sys/class/gpio/gpio14/value";
    pub const DEFAULT_PULSES: u32 = 5;

    pub fn new(value_path: impl Into<PathBuf>, pulses: u32) -> Self {
        Self {
            value_path: value_path.into(),
            pulses,
            pulse: Duration::from_millis(500),
            line: Arc::new(Mutex::new(())),
        }
    }

    /// Checks that the value file exists, so misconfiguration fails at startup.
    pub fn check(&self) -> ServerResult<()> {
        if self.value_path.exists() {
            Ok(())
        } else {
            Err(ServerError::config(format!(
                "GPIO value file {} does not exist (is the line exported?)",
                self.value_path.display()
            )))
        }
    }
}

impl Default for GpioActuator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VALUE_PATH, Self::DEFAULT_PULSES)
    }
}

/// Writes `pulses` high/low cycles, each level held for `pulse`, ending low.
pub(crate) async fn blink(path: &Path, pulses: u32, pulse: Duration) -> std::io::Result<()> {
    for _ in 0..pulses {
        std::fs::write(path, b"1")?;
        tokio::time::sleep(pulse).await;
        std::fs::write(path, b"0")?;
        tokio::time::sleep(pulse).await;
    }
    Ok(())
}

impl Actuator for GpioActuator {
    fn name(&self) -> &str {
        "gpio"
    }

    fn fire<'a>(&'a self, event: &'a NormalizedEvent) -> BoxFuture<'a, ServerResult<()>> {
        Box::pin(async move {
            let path = self.value_path.clone();
            let (pulses, pulse) = (self.pulses, self.pulse);
            let name = event.name.clone();
            let pattern = async move {
                if let Err(e) = blink(&path, pulses, pulse).await {
                    warn!(error = %e, event = %name, path = %path.display(), "GPIO blink failed");
                }
            };

            match self.line.clone().try_lock_owned() {
                Ok(guard) => {
                    // Leave the line low before handing the blinking to a task.
                    std::fs::write(&self.value_path, b"0").map_err(|e| {
                        ServerError::actuator_with_source(
                            "gpio",
                            format!("failed to write {}", self.value_path.display()),
                            e,
                        )
                    })?;
                    tokio::spawn(async move {
                        pattern.await;
                        drop(guard);
                    });
                }
                Err(_) => {
                    debug!(event = %event.name, "GPIO line busy, queueing blink");
                    let line = self.line.clone();
                    tokio::spawn(async move {
                        let _guard = line.lock_owned().await;
                        pattern.await;
                    });
                }
            }
            Ok(())
        })
    }
}

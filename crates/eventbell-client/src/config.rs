//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/eventbell/config.toml` by default. The file has four tables:
//! `[google]` for the calendar source, `[reminder]` for the poll loop,
//! `[logging]` and `[actuator]`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::Level;

use eventbell_core::{TracingConfig, TracingOutputFormat};
use eventbell_providers::google::{GoogleConfig, OAuthCredentials};
use eventbell_server::{GpioActuator, PollConfig};

use crate::error::{ClientError, ClientResult};

/// Configuration for the eventbell binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Google Calendar settings.
    pub google: GoogleSettings,

    /// Poll loop settings.
    pub reminder: ReminderSettings,

    /// Log output settings.
    pub logging: LoggingSettings,

    /// What happens when a reminder fires.
    pub actuator: ActuatorSettings,
}

/// Google Calendar settings, including the OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// API key sent with every request (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_key: Option<String>,

    /// OAuth client ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Google Cloud Console credentials JSON, instead of the inline pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,

    /// Where the OAuth tokens are stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<PathBuf>,

    /// Calendar IDs to poll: a comma-separated string or an array.
    #[serde(deserialize_with = "deserialize_calendars")]
    pub calendars: Vec<String>,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            developer_key: None,
            client_id: None,
            client_secret: None,
            credentials_file: None,
            token_path: None,
            calendars: Vec::new(),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CalendarList {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_calendars<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = match CalendarList::deserialize(deserializer)? {
        CalendarList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        CalendarList::List(list) => list,
    };
    Ok(ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

impl GoogleSettings {
    /// Resolves the OAuth client from the inline pair or the credentials file.
    pub fn credentials(&self) -> ClientResult<OAuthCredentials> {
        let credentials = match (&self.client_id, &self.client_secret, &self.credentials_file) {
            (Some(id), Some(secret), _) => OAuthCredentials::new(id, secret),
            (Some(_), None, _) | (None, Some(_), _) => {
                return Err(ClientError::config(
                    "[google] needs both client_id and client_secret",
                ));
            }
            (None, None, Some(path)) => OAuthCredentials::from_file(path).map_err(|e| {
                ClientError::config(format!(
                    "failed to load credentials from {}: {}",
                    path.display(),
                    e
                ))
            })?,
            (None, None, None) => {
                return Err(ClientError::config(format!(
                    "Google credentials not found. Add to {}:\n  \
                     [google]\n  \
                     client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                     client_secret = \"YOUR_SECRET\"\n\n  \
                     or set credentials_file to the JSON downloaded from the Cloud Console",
                    ClientConfig::default_path().display()
                )));
            }
        };
        credentials
            .validate()
            .map_err(|e| ClientError::config(format!("invalid Google credentials: {}", e)))?;
        Ok(credentials)
    }

    /// Builds the provider configuration.
    pub fn to_provider_config(&self) -> ClientResult<GoogleConfig> {
        let mut config = GoogleConfig::new(self.credentials()?)
            .with_timeout(Duration::from_secs(self.timeout_secs));

        if let Some(ref key) = self.developer_key {
            config = config.with_developer_key(key);
        }
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(path);
        }

        config
            .validate()
            .map_err(|e| ClientError::config(e.to_string()))?;
        Ok(config)
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Offset used when a calendar reports no default reminder.
    pub default_minutes: i64,

    pub poll_interval_secs: u64,

    pub window_days: i64,

    /// Fire each non-repeating event once per trigger minute. Off unless set.
    pub suppress_duplicates: bool,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        let poll = PollConfig::default();
        Self {
            default_minutes: poll.default_reminder_minutes,
            poll_interval_secs: poll.poll_interval.as_secs(),
            window_days: poll.window_days,
            suppress_duplicates: poll.suppress_duplicates,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log to this file (rotated daily) instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Default level when `RUST_LOG` is unset.
    pub level: String,

    /// Emit JSON lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: None,
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingSettings {
    pub fn level(&self) -> ClientResult<Level> {
        self.level
            .parse()
            .map_err(|_| ClientError::config(format!("unknown log level '{}'", self.level)))
    }

    /// Builds the tracing configuration; `debug` forces debug output.
    pub fn to_tracing_config(&self, debug: bool) -> ClientResult<TracingConfig> {
        let mut config = if debug {
            TracingConfig::cli_debug()
        } else if self.json {
            TracingConfig::daemon().with_level(self.level()?)
        } else {
            TracingConfig::default().with_level(self.level()?)
        };
        if self.json {
            config = config.with_format(TracingOutputFormat::Json);
        }
        if let Some(ref file) = self.file {
            config = config.with_log_file(file);
        }
        Ok(config)
    }
}

/// Which actuator fires reminders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    #[default]
    Log,
    Desktop,
    Command,
    Gpio,
}

impl ActuatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Desktop => "desktop",
            Self::Command => "command",
            Self::Gpio => "gpio",
        }
    }
}

/// Actuator settings. Only the fields for the selected kind are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorSettings {
    pub kind: ActuatorKind,

    /// Program and arguments for the `command` actuator; `{name}` is
    /// replaced by the event name.
    pub command: Vec<String>,

    /// sysfs value file for the `gpio` actuator.
    pub gpio_value_path: PathBuf,

    /// Number of blinks for the `gpio` actuator.
    pub gpio_pulses: u32,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            kind: ActuatorKind::Log,
            command: Vec::new(),
            gpio_value_path: PathBuf::from(GpioActuator::DEFAULT_VALUE_PATH),
            gpio_pulses: GpioActuator::DEFAULT_PULSES,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `path`.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::config(format!("{}: {}", path.display(), e)))
    }

    /// Loads `explicit` if given, else the default path if it exists, else
    /// the defaults.
    pub fn load(explicit: Option<&Path>) -> ClientResult<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parses a TOML document.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventbell")
            .join("config.toml")
    }

    /// Builds the poll loop configuration.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.google.calendars.clone())
            .with_default_reminder_minutes(self.reminder.default_minutes)
            .with_poll_interval(Duration::from_secs(self.reminder.poll_interval_secs))
            .with_window_days(self.reminder.window_days)
            .with_suppress_duplicates(self.reminder.suppress_duplicates)
    }

    /// Checks everything `run` needs before anything is started.
    pub fn validate(&self) -> ClientResult<()> {
        if self.google.calendars.is_empty() {
            return Err(ClientError::config(
                "[google] calendars must name at least one calendar",
            ));
        }
        self.google.to_provider_config()?;
        self.poll_config().validate()?;
        self.logging.level()?;
        if self.actuator.kind == ActuatorKind::Command && self.actuator.command.is_empty() {
            return Err(ClientError::config(
                "[actuator] kind = \"command\" needs a command",
            ));
        }
        Ok(())
    }

    /// Returns a copy with the client secret masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.google.client_secret.is_some() {
            config.google.client_secret = Some("********".to_string());
        }
        config
    }
}

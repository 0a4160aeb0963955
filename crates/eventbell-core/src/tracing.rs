//! Tracing setup for eventbell
//!
//! Provides unified logging configuration for the daemon and its commands.
//! Output goes to stderr, or to a daily-rotated log file when
//! [`TracingConfig::log_file`] is set.
//!
//! # Usage
//!
//! ```ignore
//! use eventbell_core::tracing::{init_tracing, TracingConfig};
//!
//! let _guard = init_tracing(TracingConfig::default().with_log_file("/var/log/eventbell.log"))?;
//! ```
//!
//! The returned [`TracingGuard`] must be kept alive for the lifetime of the
//! process; dropping it flushes and stops the background file writer.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    prelude::*,
};

/// Number of rotated log files kept on disk.
pub const LOG_FILES_KEPT: usize = 3;

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    /// Failed to prepare the log directory
    #[error("failed to create log directory {path}: {source}")]
    LogDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the rolling log file
    #[error("failed to open log file: {0}")]
    LogFile(#[from] tracing_appender::rolling::InitError),
}

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format (default)
    #[default]
    Compact,
    /// JSON format (useful for structured logging in daemon mode)
    Json,
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// The default log level when RUST_LOG is not set
    pub default_level: Level,
    /// Output format for log messages
    pub output_format: TracingOutputFormat,
    /// Whether to include file/line information in logs
    pub include_location: bool,
    /// Whether to include target (module path) in logs
    pub include_target: bool,
    /// Whether to include span events (enter/exit)
    pub include_span_events: bool,
    /// Custom env filter directive (overrides default_level if set)
    pub env_filter: Option<String>,
    /// Write logs to this file (rotated daily) instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: true,
            include_span_events: false,
            env_filter: None,
            log_file: None,
        }
    }
}

impl TracingConfig {
    /// Create a config suitable for interactive debugging
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Pretty,
            include_location: true,
            ..Self::default()
        }
    }

    /// Create a config suitable for the long-running poll daemon
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Json,
            include_location: true,
            include_target: true,
            include_span_events: false,
            env_filter: None,
            log_file: None,
        }
    }

    /// Set the default log level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set a custom env filter directive
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Send output to a daily-rotated log file
    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// Keeps the background log writer alive.
#[derive(Debug)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    _worker: Option<WorkerGuard>,
}

/// Splits a log file path into the directory and the file name prefix used
/// by the rolling appender.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "eventbell.log".to_string());
    (dir, prefix)
}

/// Initialize tracing with the given configuration.
///
/// This should be called once at the start of the application.
/// The `RUST_LOG` environment variable can be used to override the default level.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set, if
/// the env filter directive is invalid, or if the log file cannot be opened.
pub fn init_tracing(config: TracingConfig) -> Result<TracingGuard, TracingError> {
    let env_filter = if let Some(ref filter) = config.env_filter {
        EnvFilter::try_new(filter)?
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("eventbell={}", config.default_level)))
    };

    let span_events = if config.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let (writer, worker, ansi) = match config.log_file {
        Some(ref path) => {
            let (dir, prefix) = split_log_path(path);
            std::fs::create_dir_all(&dir).map_err(|source| TracingError::LogDirectory {
                path: dir.clone(),
                source,
            })?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(LOG_FILES_KEPT)
                .build(&dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target)
        .with_span_events(span_events);

    let layer = match config.output_format {
        TracingOutputFormat::Pretty => base.pretty().boxed(),
        TracingOutputFormat::Compact => base.compact().boxed(),
        TracingOutputFormat::Json => base.json().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(TracingGuard { _worker: worker })
}

//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// eventbell - fire a reminder when a calendar event is about to end
#[derive(Debug, Parser)]
#[command(name = "eventbell")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "EVENTBELL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns the subcommand, defaulting to `run`.
    pub fn resolved_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { no_consent: false })
    }
}

/// Available commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the poll loop (default)
    Run {
        /// Fail instead of opening a browser when no credential is stored
        #[arg(long)]
        no_consent: bool,
    },

    /// Authorize access to Google Calendar
    Auth {
        /// Run the consent flow even if a valid credential is stored
        #[arg(long, short)]
        force: bool,
    },

    /// Run one fetch/evaluate cycle and print what would fire
    Check,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ConfigAction {
    /// Show configuration file path
    Path,

    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,
}

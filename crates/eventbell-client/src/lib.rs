//! CLI, configuration file and commands
//!
//! This crate provides the `eventbell` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};

//! eventbell CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use eventbell_core::init_tracing;
use eventbell_providers::google::Consent;

use eventbell_client::cli::{Cli, Command, ConfigAction};
use eventbell_client::commands;
use eventbell_client::config::ClientConfig;
use eventbell_client::error::{ClientError, ClientResult};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    let config = match ClientConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive until exit so file logs are flushed.
    let _guard = match config
        .logging
        .to_tracing_config(cli.debug)
        .and_then(|tracing| init_tracing(tracing).map_err(ClientError::from))
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli, &config, config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e.describe(), "eventbell failed");
            eprintln!("error: {}", e.describe());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &ClientConfig, config_path: PathBuf) -> ClientResult<()> {
    match cli.resolved_command() {
        Command::Run { no_consent } => {
            let consent = if no_consent {
                Consent::Denied
            } else {
                Consent::Allowed
            };
            commands::run::run(config, consent).await
        }
        Command::Auth { force } => commands::auth::google(config, force).await,
        Command::Check => commands::check::check(config).await,
        Command::Config { action } => match action {
            ConfigAction::Path => commands::config::path(&config_path),
            ConfigAction::Dump => commands::config::dump(config, &config_path),
            ConfigAction::Validate => commands::config::validate(config),
        },
    }
}

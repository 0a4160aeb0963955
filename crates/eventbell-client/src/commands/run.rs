//! `eventbell run`: the poll loop in the foreground.

use tracing::info;

use eventbell_providers::google::Consent;
use eventbell_server::{AppContext, LoopExit, PollLoop, SignalHandler};

use crate::config::ClientConfig;
use crate::error::ClientResult;

use super::{build_actuator, connect};

/// Runs the poll loop until a shutdown signal or a fatal error.
pub async fn run(config: &ClientConfig, consent: Consent) -> ClientResult<()> {
    config.validate()?;

    let actuator = build_actuator(&config.actuator)?;
    let provider = connect(config, consent).await?;
    let ctx = AppContext::new(config.poll_config(), Box::new(provider), actuator);

    let signals = SignalHandler::new();
    signals.spawn_listener();

    let exit = PollLoop::new(ctx)
        .with_shutdown(signals.shutdown_handle())
        .run()
        .await?;

    match exit {
        LoopExit::Shutdown => info!("shut down"),
        LoopExit::MaxCycles => info!("finished"),
    }
    Ok(())
}

//! Subcommand implementations and the wiring they share.

pub mod auth;
pub mod check;
pub mod config;
pub mod run;

use tracing::debug;

use eventbell_providers::CalendarProvider;
use eventbell_providers::google::{Consent, GoogleProvider};
use eventbell_server::{
    Actuator, CommandActuator, DesktopActuator, GpioActuator, LogActuator,
};

use crate::config::{ActuatorKind, ActuatorSettings, ClientConfig};
use crate::error::ClientResult;

/// Builds the configured actuator, checking what can be checked up front.
pub fn build_actuator(settings: &ActuatorSettings) -> ClientResult<Box<dyn Actuator>> {
    let actuator: Box<dyn Actuator> = match settings.kind {
        ActuatorKind::Log => Box::new(LogActuator),
        ActuatorKind::Desktop => Box::new(DesktopActuator::new()),
        ActuatorKind::Command => Box::new(CommandActuator::from_argv(&settings.command)?),
        ActuatorKind::Gpio => {
            let gpio = GpioActuator::new(settings.gpio_value_path.clone(), settings.gpio_pulses);
            gpio.check()?;
            Box::new(gpio)
        }
    };
    debug!(actuator = actuator.name(), "actuator ready");
    Ok(actuator)
}

/// Creates the Google provider and makes sure it holds a usable credential.
pub async fn connect(config: &ClientConfig, consent: Consent) -> ClientResult<GoogleProvider> {
    let provider = GoogleProvider::new(config.google.to_provider_config()?)?;
    provider.acquire_credential(consent).await?;
    debug!(provider = provider.name(), "credential acquired");
    Ok(provider)
}

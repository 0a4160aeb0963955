//! `eventbell config`: inspect the configuration file.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout, secret masked.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;
    println!(
        "Configuration is valid: {} calendar(s), {} actuator.",
        config.google.calendars.len(),
        config.actuator.kind.as_str()
    );
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    let state = if path.exists() { "" } else { " (not found)" };
    println!("config: {}{}", path.display(), state);
    Ok(())
}

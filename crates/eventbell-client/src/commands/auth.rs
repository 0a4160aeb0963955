//! `eventbell auth`: interactive Google consent.

use tracing::info;

use eventbell_providers::google::{Consent, GoogleProvider};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Runs the consent flow unless a usable credential is already stored.
///
/// With `force`, the flow runs regardless and replaces the stored tokens.
pub async fn google(config: &ClientConfig, force: bool) -> ClientResult<()> {
    let provider_config = config.google.to_provider_config()?;
    let token_path = provider_config.token_path.clone();
    let provider = GoogleProvider::new(provider_config)?;

    if !force {
        match provider.acquire_credential(Consent::Denied).await {
            Ok(()) => {
                println!("Already authenticated with Google Calendar.");
                println!("Use --force to re-authenticate.");
                return Ok(());
            }
            Err(e) if e.code().is_auth() => info!(reason = %e, "consent required"),
            Err(e) => return Err(e.into()),
        }
    }

    println!("Starting Google Calendar authentication...");
    println!();
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    provider.authenticate().await?;

    info!("Google authentication successful");
    println!();
    println!("Authentication successful!");
    println!("Tokens saved to {}", token_path.display());
    Ok(())
}

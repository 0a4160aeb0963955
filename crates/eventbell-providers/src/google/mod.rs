//! Google Calendar provider.
//!
//! # Authentication Flow
//!
//! 1. The user registers their own OAuth client (Google requires one)
//! 2. A loopback listener is bound on 127.0.0.1
//! 3. The browser opens Google's consent page with a PKCE challenge
//! 4. Google redirects back with an authorization code
//! 5. The code is exchanged for access and refresh tokens
//! 6. Tokens are persisted and refreshed when they expire
//!
//! # Example
//!
//! ```ignore
//! use eventbell_providers::google::{Consent, GoogleConfig, GoogleProvider, OAuthCredentials};
//!
//! let credentials = OAuthCredentials::from_file("client_secret.json")?;
//! let provider = GoogleProvider::new(GoogleConfig::new(credentials))?;
//! provider.acquire_credential(Consent::Allowed).await?;
//! ```

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::{CALENDAR_API_BASE, GoogleCalendarClient};
pub use config::{GoogleConfig, OAuthCredentials};
pub use oauth::{Callback, OAuthClient, PkceFlow, parse_callback};
pub use provider::{Consent, GoogleProvider};
pub use tokens::{TokenInfo, TokenStorage};

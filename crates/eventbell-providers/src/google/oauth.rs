//! OAuth 2.0 authorization code flow with PKCE for Google APIs.
//!
//! Desktop consent uses a loopback redirect:
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Bind a listener on 127.0.0.1 in the configured port range
//! 3. Open the browser on Google's consent page
//! 4. Read the authorization code from the redirect request
//! 5. Exchange the code (with the verifier) for access and refresh tokens
//!
//! Refresh uses the same token endpoint with the stored refresh token.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Random bytes in the code verifier, before base64 encoding.
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long the user has to finish consent in the browser.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_PATH: &str = "/callback";

const PAGE_OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>eventbell is authorized</h1>\
    <p>You can close this window.</p></body></html>";
const PAGE_FAILED: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization failed</h1>\
    <p>You can close this window.</p></body></html>";

/// Token endpoint client for one OAuth application.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::internal("failed to build HTTP client").with_source(e))?;

        Ok(Self {
            credentials,
            http_client,
        })
    }

    /// Runs the interactive consent flow and returns fresh tokens.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if no loopback port is free, and with
    /// an authentication error if the user denies access, the state does not
    /// match, or consent times out.
    pub async fn authorize(
        &self,
        scopes: &[&str],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback(port_range).await?;
        let redirect_uri = format!("http://127.0.0.1:{port}{CALLBACK_PATH}");
        let auth_url = pkce.auth_url(&self.credentials.client_id, &redirect_uri, scopes)?;

        info!(port, "waiting for consent in the browser");
        debug!(url = %auth_url, "authorization URL");

        if let Err(e) = open::that(auth_url.as_str()) {
            warn!(error = %e, "failed to open browser");
            eprintln!("\nOpen this URL in your browser to authorize eventbell:\n\n{auth_url}\n");
        }

        let callback = tokio::time::timeout(CALLBACK_TIMEOUT, accept_callback(&listener))
            .await
            .map_err(|_| ProviderError::authentication("timed out waiting for consent"))??;

        if callback.state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch in consent callback",
            ));
        }

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", callback.code.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self.token_request(&params, "token exchange").await?;

        info!("obtained tokens");
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.iter().map(|s| s.to_string()).collect(),
        ))
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// A rejected refresh token is an authentication error.
    pub async fn refresh(&self, tokens: TokenInfo) -> ProviderResult<TokenInfo> {
        let refresh_token = tokens
            .refresh_token
            .clone()
            .ok_or_else(|| ProviderError::authentication("no refresh token stored"))?;

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.token_request(&params, "token refresh").await?;

        info!("refreshed access token");
        Ok(tokens.refreshed(
            response.access_token,
            response.refresh_token,
            response.expires_in,
        ))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{what} request failed")).with_source(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read {what} response")).with_source(e)
        })?;

        if status.is_server_error() {
            return Err(ProviderError::server(format!("{what} failed ({status})")));
        }
        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{what} rejected ({status}): {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid {what} response")).with_source(e)
        })
    }
}

/// Binds the first free loopback port in the range.
async fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)).await {
            debug!(port, "bound loopback listener");
            return Ok((listener, port));
        }
    }
    Err(ProviderError::configuration(format!(
        "no available loopback port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Accepts connections until one carries the consent redirect.
async fn accept_callback(listener: &TcpListener) -> ProviderResult<Callback> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| ProviderError::internal("loopback accept failed").with_source(e))?;

        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.is_err() {
            continue;
        }

        let Some(result) = parse_callback(&request_line) else {
            debug!(%peer, "ignoring unrelated loopback request");
            continue;
        };

        let page = if result.is_ok() { PAGE_OK } else { PAGE_FAILED };
        let mut stream = reader.into_inner();
        if let Err(e) = stream.write_all(page.as_bytes()).await {
            debug!(error = %e, "failed to answer browser");
        }
        let _ = stream.shutdown().await;

        return result;
    }
}

/// Code and state carried by the consent redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub code: String,
    pub state: String,
}

/// Parses an HTTP request line such as `GET /callback?code=..&state=.. HTTP/1.1`.
///
/// Returns `None` for requests that are not the consent redirect (favicon
/// fetches and the like).
pub fn parse_callback(request_line: &str) -> Option<ProviderResult<Callback>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let url = Url::parse("http://127.0.0.1").ok()?.join(parts.next()?).ok()?;
    if url.path() != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Some(Err(ProviderError::authentication(format!(
                    "authorization denied: {value}"
                ))));
            }
            _ => {}
        }
    }

    Some(match code {
        Some(code) => Ok(Callback {
            code,
            state: state.unwrap_or_default(),
        }),
        None => Err(ProviderError::authentication(
            "consent callback carried no authorization code",
        )),
    })
}

/// PKCE verifier, challenge and CSRF state for one consent attempt (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    /// Builds Google's consent URL for this attempt.
    pub fn auth_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[&str],
    ) -> ProviderResult<Url> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("code_challenge", self.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", self.state.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ProviderError::internal("failed to build consent URL").with_source(e))
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(&bytes)
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_43_chars() {
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn challenge_matches_rfc7636_example() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn flows_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_parameters() {
        let flow = PkceFlow::new();
        let url = flow
            .auth_url(
                "id.apps.googleusercontent.com",
                "http://127.0.0.1:8080/callback",
                &[crate::google::GoogleConfig::DEFAULT_SCOPE],
            )
            .unwrap();

        assert!(url.as_str().starts_with(GOOGLE_AUTH_URL));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "id.apps.googleusercontent.com");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8080/callback");
        assert_eq!(pairs["code_challenge"], flow.challenge);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["state"], flow.state);
        assert_eq!(pairs["access_type"], "offline");
    }

    mod callback {
        use super::*;

        #[test]
        fn code_and_state() {
            let parsed = parse_callback("GET /callback?code=4%2F0abc&state=xyz HTTP/1.1\r\n")
                .unwrap()
                .unwrap();
            assert_eq!(
                parsed,
                Callback {
                    code: "4/0abc".to_string(),
                    state: "xyz".to_string()
                }
            );
        }

        #[test]
        fn denied() {
            let err = parse_callback("GET /callback?error=access_denied HTTP/1.1")
                .unwrap()
                .unwrap_err();
            assert!(err.code().is_auth());
            assert!(err.message().contains("access_denied"));
        }

        #[test]
        fn missing_code() {
            let result = parse_callback("GET /callback?state=xyz HTTP/1.1").unwrap();
            assert!(result.is_err());
        }

        #[test]
        fn unrelated_requests_are_ignored() {
            assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_none());
            assert!(parse_callback("POST /callback?code=a HTTP/1.1").is_none());
            assert!(parse_callback("").is_none());
        }
    }

    #[tokio::test]
    async fn bind_loopback_reports_exhausted_range() {
        let held = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = held.local_addr().unwrap().port();

        let err = bind_loopback((port, port)).await.unwrap_err();
        assert_eq!(
            err.code(),
            crate::error::ProviderErrorCode::ConfigurationError
        );
    }
}

//! OAuth token storage.
//!
//! The credential store is a single JSON file holding the access token, the
//! refresh token and the access token's expiry. It is written atomically and
//! readable only by the owner.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

/// Access tokens are treated as expired this long before their real expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A persisted OAuth credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The bearer token for API requests.
    pub access_token: String,

    /// Used to obtain a new access token without user interaction.
    pub refresh_token: Option<String>,

    /// When the access token stops being usable (already includes the margin).
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl TokenInfo {
    /// Creates token info from a token endpoint response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    ///
    /// Tokens without an expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if the token covers every required scope.
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|scope| self.scopes.iter().any(|s| s == scope))
    }

    /// Replaces the access token after a refresh.
    ///
    /// Google may also rotate the refresh token; a `None` keeps the old one.
    pub fn refreshed(
        mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
    ) -> Self {
        self.access_token = access_token.into();
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self.expires_at = expires_in_secs.map(expiry_from_now);
        self
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// File-backed token storage with an in-memory copy.
#[derive(Debug)]
pub struct TokenStorage {
    path: PathBuf,
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates a new token storage at the given path. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<TokenInfo>> {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<TokenInfo>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads tokens from disk into memory.
    ///
    /// Returns `Ok(true)` if tokens were loaded, `Ok(false)` if no file exists.
    /// A file that cannot be parsed is an authentication error: the user has
    /// to consent again.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            return Ok(false);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read token file {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        let tokens: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::authentication(format!(
                "token file {} is not valid",
                self.path.display()
            ))
            .with_source(e)
        })?;

        info!(path = %self.path.display(), "loaded stored credential");
        *self.write() = Some(tokens);
        Ok(true)
    }

    /// Writes `tokens` to disk (temp file + rename, mode 0600) and keeps them in memory.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.persist(&tokens)?;
        *self.write() = Some(tokens);
        Ok(())
    }

    fn persist(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        let io_err = |what: &str, e: std::io::Error| {
            ProviderError::configuration(format!("failed to {} {}", what, self.path.display()))
                .with_source(e)
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_err("create the directory of", e))?;
        }

        let content = serde_json::to_string_pretty(tokens).map_err(|e| {
            ProviderError::internal("failed to serialize tokens").with_source(e)
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| io_err("write", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
                .map_err(|e| io_err("set permissions on", e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| io_err("replace", e))?;

        debug!(path = %self.path.display(), "saved credential");
        Ok(())
    }

    /// Returns a copy of the current tokens, if any.
    pub fn get(&self) -> Option<TokenInfo> {
        self.read().clone()
    }

    /// Returns the current access token, if one is loaded.
    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|t| t.access_token.clone())
    }

    /// Returns the refresh token, if one is loaded.
    pub fn refresh_token(&self) -> Option<String> {
        self.read().as_ref().and_then(|t| t.refresh_token.clone())
    }

    /// Removes the stored tokens from memory and disk.
    pub fn clear(&self) -> ProviderResult<()> {
        *self.write() = None;
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!(
                    "failed to remove token file {}",
                    self.path.display()
                ))
                .with_source(e)
            })?;
            info!(path = %self.path.display(), "cleared stored credential");
        }
        Ok(())
    }

    /// Returns the token storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if tokens are loaded and not expired.
    pub fn has_valid_tokens(&self) -> bool {
        self.read().as_ref().is_some_and(|t| !t.is_expired())
    }

    /// Returns true if re-consent is needed because a required scope is missing.
    pub fn needs_reauth(&self, required_scopes: &[&str]) -> bool {
        self.read()
            .as_ref()
            .is_none_or(|t| !t.has_scopes(required_scopes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage_in(dir: &TempDir) -> TokenStorage {
        TokenStorage::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn token_info_expiry() {
        let token = TokenInfo::new("access", Some("refresh".into()), Some(3600), vec![]);
        assert!(!token.is_expired());

        // Inside the margin counts as expired.
        let token = TokenInfo::new("access", None, Some(30), vec![]);
        assert!(token.is_expired());

        let token = TokenInfo::new("access", None, None, vec![]);
        assert!(!token.is_expired());
    }

    #[test]
    fn refreshed_keeps_refresh_token_unless_rotated() {
        let token = TokenInfo::new("old", Some("refresh-1".into()), Some(10), vec![]);

        let token = token.refreshed("new", None, Some(3600));
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
        assert!(!token.is_expired());

        let token = token.refreshed("newer", Some("refresh-2".into()), Some(3600));
        assert_eq!(token.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[test]
    fn scope_check() {
        let token = TokenInfo::new("a", None, None, vec!["s1".into(), "s2".into()]);
        assert!(token.has_scopes(&["s1"]));
        assert!(token.has_scopes(&["s1", "s2"]));
        assert!(!token.has_scopes(&["s3"]));
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);

        let token = TokenInfo::new("access", Some("refresh".into()), Some(3600), vec![]);
        storage.set(token.clone()).unwrap();
        assert!(storage.path().exists());

        let reloaded = TokenStorage::new(storage.path());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get(), Some(token));
        assert_eq!(reloaded.access_token().as_deref(), Some("access"));
        assert_eq!(reloaded.refresh_token().as_deref(), Some("refresh"));
        assert!(reloaded.has_valid_tokens());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.set(TokenInfo::new("a", None, None, vec![])).unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        assert!(!storage.load().unwrap());
        assert!(storage.get().is_none());
        assert!(!storage.has_valid_tokens());
    }

    #[test]
    fn corrupt_file_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();

        let err = TokenStorage::new(&path).load().unwrap_err();
        assert!(err.code().is_auth());
    }

    #[test]
    fn clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        storage.set(TokenInfo::new("a", None, None, vec![])).unwrap();

        storage.clear().unwrap();
        assert!(!storage.path().exists());
        assert!(storage.get().is_none());
    }

    #[test]
    fn needs_reauth_on_missing_scope() {
        let dir = TempDir::new().unwrap();
        let storage = storage_in(&dir);
        assert!(storage.needs_reauth(&["s1"]));

        storage
            .set(TokenInfo::new("a", None, None, vec!["s1".into()]))
            .unwrap();
        assert!(!storage.needs_reauth(&["s1"]));
        assert!(storage.needs_reauth(&["s2"]));
    }
}

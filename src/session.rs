//! Authentication token persisted between runs.
//!
//! The token lives in a small JSON file next to the configuration, together with
//! its expiry date. An older plain-text `token` file from previous releases is
//! removed on logout as well.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every proxy token starts with this prefix.
pub const TOKEN_PREFIX: &str = "pro_";

/// Token accepted by proxies running with anonymous access enabled.
pub const OPEN_ACCESS_TOKEN: &str = "pro_token_openbar";

const SESSION_FILE: &str = "session.json";
const LEGACY_TOKEN_FILE: &str = "token";

/// A candidate token failed the local format check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Token is not well formatted. It must start with 'pro_' and be at least 10 characters long.")]
pub struct TokenError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to write session file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove session file {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Token lifetime of {0} days is out of range")]
    Ttl(i64),
    #[error("Failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Check the shape of a token before sending it anywhere.
pub fn validate_token(candidate: &str) -> Result<(), TokenError> {
    if !candidate.is_empty() && candidate.len() > 10 && candidate.starts_with(TOKEN_PREFIX) {
        Ok(())
    } else {
        Err(TokenError)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionStore {
    /// Directory holding the session file.
    dir: PathBuf,
    /// Token in use, persisted or not.
    token: Option<String>,
    /// Whether the proxy accepted `token`.
    valid: bool,
}

impl SessionStore {
    /// Open the store in `dir`, picking up a previously saved token that has not expired.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let token = Self::read_stored(&dir.join(SESSION_FILE));
        Self {
            dir,
            token,
            valid: false,
        }
    }

    fn read_stored(path: &Path) -> Option<String> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str::<StoredToken>(&content) {
            Ok(stored) if stored.expires_at > Utc::now() => Some(stored.token),
            Ok(_) => {
                tracing::info!("Stored token expired, removing {}", path.display());
                let _ = fs::remove_file(path);
                None
            }
            Err(err) => {
                tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Token to send with requests, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Persist `token` for `ttl_days` days; a non-positive TTL clears the session instead.
    pub fn set_token(&mut self, token: &str, ttl_days: i64) -> Result<(), SessionError> {
        if ttl_days <= 0 {
            return self.clear();
        }

        let expires_at = TimeDelta::try_days(ttl_days)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or(SessionError::Ttl(ttl_days))?;

        let path = self.session_path();
        fs::create_dir_all(&self.dir).map_err(|source| SessionError::Write {
            path: path.clone(),
            source,
        })?;
        let stored = StoredToken {
            token: token.to_string(),
            expires_at,
        };
        fs::write(&path, serde_json::to_string_pretty(&stored)?)
            .map_err(|source| SessionError::Write { path, source })?;

        self.token = Some(token.to_string());
        Ok(())
    }

    /// Use `token` for this run only, without writing it to disk.
    pub fn adopt(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    /// Forget the token, on disk (including the legacy file) and in memory.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.token = None;
        self.valid = false;

        for path in [self.session_path(), self.dir.join(LEGACY_TOKEN_FILE)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(SessionError::Remove { path, source }),
            }
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

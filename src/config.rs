//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Every collaborator (identity backend, business API, object storage) is
//! configured from one typed struct so the shell builds all clients from a
//! single parse. URLs are normalized without a trailing slash.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_REDIRECT_URI: &str = "tunedin://";
pub const DEFAULT_STORAGE_BUCKET: &str = "concert-photos";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required env var {0}")]
    Missing(&'static str),

    /// A value is present but unusable.
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Identity/storage backend project URL (e.g. `https://xyz.supabase.co`).
    pub auth_url: String,
    /// Public anon key sent as `apikey` on every backend request.
    pub anon_key: String,
    /// Business API root, including any `/api` prefix.
    pub api_url: String,
    /// Redirect URI registered with the OAuth providers. No extra path segments.
    pub redirect_uri: String,
    pub storage_bucket: String,
    /// Where the current session is persisted between runs, if anywhere.
    pub session_file: Option<PathBuf>,
    pub timeouts: HttpTimeouts,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `TUNEDIN_AUTH_URL`
    /// - `TUNEDIN_AUTH_ANON_KEY`
    ///
    /// Optional:
    /// - `TUNEDIN_API_URL`: default `http://127.0.0.1:8080/api`
    /// - `TUNEDIN_REDIRECT_URI`: default `tunedin://`
    /// - `TUNEDIN_STORAGE_BUCKET`: default `concert-photos`
    /// - `TUNEDIN_SESSION_FILE`: enables session persistence
    /// - `TUNEDIN_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TUNEDIN_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a URL is
    /// malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_url = std::env::var("TUNEDIN_AUTH_URL").map_err(|_| ConfigError::Missing("TUNEDIN_AUTH_URL"))?;
        let anon_key =
            std::env::var("TUNEDIN_AUTH_ANON_KEY").map_err(|_| ConfigError::Missing("TUNEDIN_AUTH_ANON_KEY"))?;

        let config = Self {
            auth_url,
            anon_key,
            api_url: std::env::var("TUNEDIN_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned()),
            redirect_uri: std::env::var("TUNEDIN_REDIRECT_URI").unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_owned()),
            storage_bucket: std::env::var("TUNEDIN_STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_STORAGE_BUCKET.to_owned()),
            session_file: std::env::var("TUNEDIN_SESSION_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            timeouts: HttpTimeouts {
                request_secs: env_parse_u64("TUNEDIN_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse_u64("TUNEDIN_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        };
        config.normalized()
    }

    /// Validate URLs and strip trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `auth_url` or `api_url` is not an
    /// `http(s)` URL, or the anon key is blank.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.auth_url = normalize_http_url("TUNEDIN_AUTH_URL", &self.auth_url)?;
        self.api_url = normalize_http_url("TUNEDIN_API_URL", &self.api_url)?;
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Invalid { var: "TUNEDIN_AUTH_ANON_KEY", message: "must not be empty".into() });
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(ConfigError::Invalid { var: "TUNEDIN_REDIRECT_URI", message: "must not be empty".into() });
        }
        Ok(self)
    }
}

fn normalize_http_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::Invalid { var, message: format!("expected http(s) URL, got '{raw}'") });
    }
    Ok(trimmed.to_owned())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

//! Identity-backend wire types: sessions, users, providers, change events.
//!
//! DESIGN
//! ======
//! `Session` embeds its `User`, so a user can never be observed without the
//! credential pair that proves it. Metadata fields are all optional because
//! each OAuth provider fills a different subset.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity-backend operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The HTTP request never produced a response.
    #[error("auth request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status. `message` is the
    /// backend's own wording and is shown to the user as-is.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The backend response body could not be deserialized.
    #[error("auth response parse failed: {0}")]
    Parse(String),

    /// An authorization URL could not be built.
    #[error("invalid auth url: {0}")]
    InvalidUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The persisted session could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl IdentityError {
    /// Whether the backend rejected the credentials themselves, as opposed to
    /// a transport failure.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status: 400..=499, .. })
    }
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// OAuth providers the login screen offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    GitHub,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::GitHub => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::GitHub),
            other => Err(format!("unknown oauth provider: {other}")),
        }
    }
}

// =============================================================================
// USER
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Provider that created the identity (e.g. `"github"`, `"email"`).
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Identity attributes of the signed-in account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity-backend user id (UUID string).
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl User {
    /// Best available human-readable name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        let meta = &self.user_metadata;
        meta.full_name
            .as_deref()
            .or(meta.name.as_deref())
            .or(meta.user_name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        let meta = &self.user_metadata;
        meta.avatar_url.as_deref().or(meta.picture.as_deref())
    }

    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.app_metadata.provider.as_deref()
    }

    /// Account id assigned by the OAuth provider (not the backend user id).
    #[must_use]
    pub fn provider_id(&self) -> Option<&str> {
        let meta = &self.user_metadata;
        meta.provider_id.as_deref().or(meta.sub.as_deref())
    }
}

// =============================================================================
// SESSION
// =============================================================================

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// Backend-issued credential pair plus the user it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds as reported at issue time.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Absolute expiry, seconds since the Unix epoch.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the backend omitted it.
    #[must_use]
    pub fn with_expiry_from(mut self, now: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now + secs);
        }
        self
    }

    /// True when the access token expires within `margin_secs` of `now`.
    /// Sessions without a known expiry never count as expiring.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at.is_some_and(|at| at - now <= margin_secs)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Kind of identity state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
        };
        f.write_str(name)
    }
}

/// One change notification: the event and the session that resulted from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

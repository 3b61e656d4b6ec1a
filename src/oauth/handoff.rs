//! Browser round trip from authorization URL to an established session.

use std::sync::Arc;

use super::parse::extract_tokens;
use crate::api::{ApiClient, BackendUser};
use crate::identity::{IdentityBackend, IdentityError, OAuthProvider, Session};
use crate::sync::{BackendUserDirectory, sync_best_effort};

/// How an in-app browser session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowserOutcome {
    /// The redirect URI was reached; `url` is the full redirect.
    Success { url: String },
    /// The user closed the browser.
    Cancel,
    Failure(String),
}

/// Host-provided browser surface.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Open `auth_url` and wait until the browser navigates to
    /// `redirect_uri` or is dismissed.
    async fn open_auth_session(&self, auth_url: &str, redirect_uri: &str) -> BrowserOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("{0}")]
    Authorize(IdentityError),

    #[error("browser session failed: {0}")]
    Browser(String),

    #[error("authentication tokens missing")]
    TokensMissing,

    #[error("{0}")]
    Exchange(IdentityError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    SignedIn {
        session: Session,
        /// `None` when backend sync is off or failed.
        backend_user: Option<BackendUser>,
    },
    Cancelled,
}

pub struct OAuthHandoff {
    identity: Arc<dyn IdentityBackend>,
    browser: Arc<dyn BrowserSession>,
    redirect_uri: String,
    api: Option<ApiClient>,
    users: Option<Arc<BackendUserDirectory>>,
}

impl OAuthHandoff {
    /// `redirect_uri` should be the bare app scheme (e.g. `tunedin://`); a
    /// path on it would not match any route when the browser returns.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityBackend>, browser: Arc<dyn BrowserSession>, redirect_uri: impl Into<String>) -> Self {
        Self { identity, browser, redirect_uri: redirect_uri.into(), api: None, users: None }
    }

    /// Mirror the signed-in user into the business API after each sign-in.
    #[must_use]
    pub fn with_backend_sync(mut self, api: ApiClient, users: Option<Arc<BackendUserDirectory>>) -> Self {
        self.api = Some(api);
        self.users = users;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityBackend> {
        &self.identity
    }

    /// Run one OAuth sign-in attempt.
    ///
    /// The session itself is published by the identity backend's change
    /// events; this only reports what happened.
    ///
    /// # Errors
    ///
    /// Returns a [`HandoffError`] for the step that failed. No session is
    /// established when it does.
    pub async fn sign_in(&self, provider: OAuthProvider) -> Result<HandoffOutcome, HandoffError> {
        let auth_url = self
            .identity
            .sign_in_with_oauth(provider, &self.redirect_uri, true)
            .await
            .map_err(HandoffError::Authorize)?;

        tracing::debug!(%provider, "opening browser for oauth");
        let redirect = match self.browser.open_auth_session(&auth_url, &self.redirect_uri).await {
            BrowserOutcome::Success { url } => url,
            BrowserOutcome::Cancel => {
                tracing::info!(%provider, "oauth sign-in cancelled");
                return Ok(HandoffOutcome::Cancelled);
            }
            BrowserOutcome::Failure(reason) => return Err(HandoffError::Browser(reason)),
        };

        let tokens = extract_tokens(&redirect).ok_or(HandoffError::TokensMissing)?;
        let session = self
            .identity
            .set_session(&tokens.access_token, &tokens.refresh_token)
            .await
            .map_err(HandoffError::Exchange)?;
        tracing::info!(%provider, user_id = %session.user.id, "oauth sign-in complete");

        let backend_user = self.sync_user(&session).await;
        Ok(HandoffOutcome::SignedIn { session, backend_user })
    }

    /// One-shot backend sync. Never fails; see [`sync_best_effort`].
    pub async fn sync_user(&self, session: &Session) -> Option<BackendUser> {
        let api = self.api.as_ref()?;
        sync_best_effort(api, self.users.as_deref(), &session.user).await
    }
}

#[cfg(test)]
#[path = "handoff_test.rs"]
mod tests;

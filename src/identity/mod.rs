//! Identity backend: the third-party service that issues sessions.
//!
//! ARCHITECTURE
//! ============
//! [`IdentityBackend`] is the seam between the app and the hosted auth
//! service. The production implementation is [`GoTrueClient`]; tests use
//! in-memory doubles. Change notifications are delivered on a broadcast
//! channel so every subscriber sees the same ordered event stream.

pub mod gotrue;
pub mod persist;
pub mod types;

use tokio::sync::broadcast;

pub use gotrue::GoTrueClient;
pub use persist::SessionFile;
pub use types::{AuthChange, AuthEvent, IdentityError, OAuthProvider, Session, User};

/// Operations the app needs from the identity backend.
#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Resolve the current session, restoring or refreshing it if needed.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if restoring or refreshing fails in a way
    /// that could not be resolved to "no session".
    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    /// Last session this backend handed out, without any I/O.
    fn current_session(&self) -> Option<Session>;

    /// Subscribe to `(event, session)` change notifications.
    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange>;

    /// Build the provider authorization URL. With `skip_browser_redirect`
    /// the caller owns the browser surface and opens the URL itself.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidUrl`] if the URL cannot be built.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        skip_browser_redirect: bool,
    ) -> Result<String, IdentityError>;

    /// Exchange a token pair captured from an OAuth redirect for a session.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the backend rejects the tokens.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, IdentityError>;

    /// # Errors
    ///
    /// Returns [`IdentityError::Api`] with the backend's message on bad
    /// credentials.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Revoke the current session. A no-op when already signed out.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the backend revocation fails. The local
    /// session is cleared either way.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

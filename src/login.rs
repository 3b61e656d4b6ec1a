//! Login screen model: runs a sign-in attempt, tracks the spinner and the
//! message to show, and moves to the landing view on success.

use std::time::Duration;

use tokio::sync::watch;

use crate::api::BackendUser;
use crate::identity::OAuthProvider;
use crate::nav::{Navigator, Route};
use crate::oauth::{HandoffError, HandoffOutcome, OAuthHandoff};
use crate::session::AuthState;

pub const MISSING_CREDENTIALS: &str = "Please enter email and password";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";

/// How long to wait for the session provider to publish a fresh sign-in
/// before navigating anyway.
const AUTH_STATE_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoginStatus {
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    SignedIn { backend_user: Option<BackendUser> },
    Cancelled,
    Failed { message: String },
}

pub struct LoginScreen {
    handoff: OAuthHandoff,
    status: watch::Sender<LoginStatus>,
    auth: Option<watch::Receiver<AuthState>>,
}

impl LoginScreen {
    #[must_use]
    pub fn new(handoff: OAuthHandoff) -> Self {
        let (status, _) = watch::channel(LoginStatus::default());
        Self { handoff, status, auth: None }
    }

    /// Hold navigation until `auth` reports the new session, so the guard
    /// never sees the landing view while still signed out.
    #[must_use]
    pub fn with_auth_state(mut self, auth: watch::Receiver<AuthState>) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn status(&self) -> LoginStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoginStatus> {
        self.status.subscribe()
    }

    /// "Sign in with Google/GitHub".
    pub async fn sign_in_with_provider<N: Navigator + ?Sized>(&self, provider: OAuthProvider, nav: &mut N) -> LoginOutcome {
        self.begin();
        let outcome = match self.handoff.sign_in(provider).await {
            Ok(HandoffOutcome::SignedIn { backend_user, .. }) => {
                self.land(nav).await;
                LoginOutcome::SignedIn { backend_user }
            }
            Ok(HandoffOutcome::Cancelled) => LoginOutcome::Cancelled,
            Err(e) => {
                tracing::warn!(%provider, error = %e, "oauth sign-in failed");
                LoginOutcome::Failed { message: handoff_message(&e) }
            }
        };
        self.finish(&outcome);
        outcome
    }

    /// Email/password form.
    pub async fn sign_in_with_password<N: Navigator + ?Sized>(&self, email: &str, password: &str, nav: &mut N) -> LoginOutcome {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            let outcome = LoginOutcome::Failed { message: MISSING_CREDENTIALS.to_owned() };
            self.finish(&outcome);
            return outcome;
        }

        self.begin();
        let outcome = match self.handoff.identity().sign_in_with_password(email, password).await {
            Ok(session) => {
                let backend_user = self.handoff.sync_user(&session).await;
                self.land(nav).await;
                LoginOutcome::SignedIn { backend_user }
            }
            Err(e) => {
                tracing::warn!(error = %e, "password sign-in failed");
                LoginOutcome::Failed { message: e.to_string() }
            }
        };
        self.finish(&outcome);
        outcome
    }

    fn begin(&self) {
        self.status.send_replace(LoginStatus { loading: true, error: None });
    }

    fn finish(&self, outcome: &LoginOutcome) {
        let error = match outcome {
            LoginOutcome::Failed { message } => Some(message.clone()),
            LoginOutcome::SignedIn { .. } | LoginOutcome::Cancelled => None,
        };
        self.status.send_replace(LoginStatus { loading: false, error });
    }

    async fn land<N: Navigator + ?Sized>(&self, nav: &mut N) {
        if let Some(auth) = &self.auth {
            let mut auth = auth.clone();
            let published = tokio::time::timeout(AUTH_STATE_WAIT, auth.wait_for(AuthState::is_authenticated))
                .await
                .is_ok_and(|r| r.is_ok());
            if !published {
                tracing::debug!("session not yet published; navigating anyway");
            }
        }
        nav.replace(Route::LANDING);
    }
}

/// Identity-backend errors are shown as-is; everything else in the browser
/// round trip collapses to a generic message.
fn handoff_message(e: &HandoffError) -> String {
    match e {
        HandoffError::Authorize(inner) | HandoffError::Exchange(inner) => inner.to_string(),
        HandoffError::Browser(_) | HandoffError::TokensMissing => AUTHENTICATION_FAILED.to_owned(),
    }
}

#[cfg(test)]
#[path = "login_test.rs"]
mod tests;

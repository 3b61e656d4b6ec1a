//! Process-wide authentication snapshot.

use crate::identity::{Session, User};

/// `{ user, session, isLoading, isAuthenticated }` as one value.
///
/// The user is only reachable through the session, so the pair is always
/// written together and `is_authenticated()` is exactly `session.is_some()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthState {
    session: Option<Session>,
    loading: bool,
}

impl AuthState {
    /// Start-of-process state: nothing known yet.
    #[must_use]
    pub fn loading() -> Self {
        Self { session: None, loading: true }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self { session: None, loading: false }
    }

    #[must_use]
    pub fn signed_in(session: Session) -> Self {
        Self { session: Some(session), loading: false }
    }

    /// Resolved state for whatever the backend reported.
    #[must_use]
    pub fn resolved(session: Option<Session>) -> Self {
        Self { session, loading: false }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::loading()
    }
}

//! Session Provider: the single writer of [`AuthState`].
//!
//! DESIGN
//! ======
//! State lives in a `watch` channel so readers always see a whole snapshot.
//! A listener task applies identity-backend change events; `initialize`
//! applies the answer to the initial session query. The two can race, so
//! every applied event bumps a counter inside the channel's write lock and
//! `initialize` only writes if no event landed while it was waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::state::AuthState;
use crate::identity::{AuthChange, IdentityBackend, IdentityError, Session};
use crate::sync::BackendUserDirectory;

struct Shared {
    state: watch::Sender<AuthState>,
    events_applied: AtomicU64,
    users: Option<Arc<BackendUserDirectory>>,
}

impl Shared {
    /// Write one backend-reported session. Always resolves loading.
    fn apply(&self, session: Option<Session>) {
        if let (None, Some(users)) = (&session, &self.users) {
            users.clear();
        }
        let next = AuthState::resolved(session);
        self.state.send_if_modified(|state| {
            self.events_applied.fetch_add(1, Ordering::SeqCst);
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
    }
}

pub struct SessionProvider {
    identity: Arc<dyn IdentityBackend>,
    shared: Arc<Shared>,
    listener: JoinHandle<()>,
}

impl SessionProvider {
    /// Subscribe to the backend and start the listener task. State starts as
    /// loading until [`initialize`](Self::initialize) or the first event.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityBackend>) -> Self {
        Self::build(identity, None)
    }

    /// Like [`new`](Self::new), also clearing `users` whenever the session
    /// goes away.
    #[must_use]
    pub fn with_user_directory(identity: Arc<dyn IdentityBackend>, users: Arc<BackendUserDirectory>) -> Self {
        Self::build(identity, Some(users))
    }

    fn build(identity: Arc<dyn IdentityBackend>, users: Option<Arc<BackendUserDirectory>>) -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        let shared = Arc::new(Shared { state, events_applied: AtomicU64::new(0), users });
        let events = identity.on_auth_state_change();
        let listener = tokio::spawn(listen(events, Arc::clone(&identity), Arc::clone(&shared)));
        Self { identity, shared, listener }
    }

    /// Ask the backend once for an existing session and resolve loading.
    ///
    /// A change event that arrives while the query is in flight wins over
    /// the query's answer. Backend errors resolve to signed-out.
    pub async fn initialize(&self) -> AuthState {
        let seen = self.shared.events_applied.load(Ordering::SeqCst);

        let session = match self.identity.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "initial session query failed");
                None
            }
        };

        let shared = &self.shared;
        shared.state.send_if_modified(|state| {
            if shared.events_applied.load(Ordering::SeqCst) != seen {
                tracing::debug!("change event resolved state first; dropping initial query result");
                return false;
            }
            let next = AuthState::resolved(session);
            if *state == next {
                return false;
            }
            *state = next;
            true
        });

        self.state()
    }

    /// Sign out at the backend, then clear local state no matter what.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`IdentityError`]; local state is already
    /// cleared when it does.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        let result = self.identity.sign_out().await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "backend sign-out failed; clearing local session anyway");
        }
        self.shared.apply(None);
        result
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.shared.state.subscribe()
    }

    /// Wait until loading has resolved and return that state.
    pub async fn resolved(&self) -> AuthState {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| !s.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityBackend> {
        &self.identity
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    mut events: broadcast::Receiver<AuthChange>,
    identity: Arc<dyn IdentityBackend>,
    shared: Arc<Shared>,
) {
    loop {
        match events.recv().await {
            Ok(change) => {
                tracing::debug!(event = %change.event, signed_in = change.session.is_some(), "auth event");
                shared.apply(change.session);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "auth event listener lagged; resyncing from backend");
                shared.apply(identity.current_session());
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[path = "provider_test.rs"]
mod tests;

//! In-memory identity backend shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::{broadcast, oneshot};

use crate::identity::types::{AppMetadata, UserMetadata};
use crate::identity::{AuthChange, AuthEvent, IdentityBackend, IdentityError, OAuthProvider, Session, User};

pub fn sample_user(email: &str) -> User {
    User {
        id: format!("id-{email}"),
        email: Some(email.to_owned()),
        app_metadata: AppMetadata { provider: Some("github".into()) },
        user_metadata: UserMetadata {
            full_name: Some("Ada Lovelace".into()),
            avatar_url: Some("https://img.example.test/ada.png".into()),
            provider_id: Some("42".into()),
            ..UserMetadata::default()
        },
    }
}

pub fn sample_session(access: &str) -> Session {
    Session {
        access_token: access.to_owned(),
        refresh_token: format!("{access}-refresh"),
        token_type: "bearer".into(),
        expires_in: Some(3600),
        expires_at: None,
        user: sample_user("ada@example.com"),
    }
}

fn api_error(status: u16, message: &str) -> IdentityError {
    IdentityError::Api { status, message: message.to_owned() }
}

#[derive(Default)]
struct Calls {
    set_session: Vec<(String, String)>,
    oauth: Vec<(OAuthProvider, String, bool)>,
}

/// Scriptable [`IdentityBackend`]. Every mutation emits on the event channel
/// the way the real client does.
pub struct MockIdentity {
    events: broadcast::Sender<AuthChange>,
    current: Mutex<Option<Session>>,
    initial: Mutex<Option<Result<Option<Session>, String>>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    reject_tokens: Mutex<Option<String>>,
    reject_password: Mutex<Option<String>>,
    fail_sign_out: Mutex<Option<String>>,
    calls: Mutex<Calls>,
    sign_out_calls: AtomicUsize,
}

impl MockIdentity {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            current: Mutex::new(None),
            initial: Mutex::new(None),
            gate: Mutex::new(None),
            reject_tokens: Mutex::new(None),
            reject_password: Mutex::new(None),
            fail_sign_out: Mutex::new(None),
            calls: Mutex::new(Calls::default()),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// What the first `get_session` call resolves to.
    pub fn with_initial(self, initial: Option<Session>) -> Self {
        *lock(&self.initial) = Some(Ok(initial.clone()));
        *lock(&self.current) = initial;
        self
    }

    pub fn with_initial_error(self, message: &str) -> Self {
        *lock(&self.initial) = Some(Err(message.to_owned()));
        self
    }

    /// Hold `get_session` until the returned sender fires.
    pub fn gate_initial(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.gate) = Some(rx);
        tx
    }

    pub fn reject_tokens(&self, message: &str) {
        *lock(&self.reject_tokens) = Some(message.to_owned());
    }

    pub fn reject_password(&self, message: &str) {
        *lock(&self.reject_password) = Some(message.to_owned());
    }

    pub fn fail_sign_out(&self, message: &str) {
        *lock(&self.fail_sign_out) = Some(message.to_owned());
    }

    /// Push a change as if the backend raised it on its own.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        *lock(&self.current) = session.clone();
        let _ = self.events.send(AuthChange { event, session });
    }

    pub fn set_session_calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).set_session.clone()
    }

    pub fn oauth_calls(&self) -> Vec<(OAuthProvider, String, bool)> {
        lock(&self.calls).oauth.clone()
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl IdentityBackend for MockIdentity {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let gate = lock(&self.gate).take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let initial = lock(&self.initial).take();
        match initial {
            Some(Ok(session)) => Ok(session),
            Some(Err(message)) => Err(IdentityError::Request(message)),
            None => Ok(self.current_session()),
        }
    }

    fn current_session(&self) -> Option<Session> {
        lock(&self.current).clone()
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        skip_browser_redirect: bool,
    ) -> Result<String, IdentityError> {
        lock(&self.calls).oauth.push((provider, redirect_to.to_owned(), skip_browser_redirect));
        Ok(format!("https://auth.example.test/authorize?provider={provider}"))
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, IdentityError> {
        lock(&self.calls)
            .set_session
            .push((access_token.to_owned(), refresh_token.to_owned()));
        let rejected = lock(&self.reject_tokens).clone();
        if let Some(message) = rejected {
            return Err(api_error(401, &message));
        }
        let mut session = sample_session(access_token);
        refresh_token.clone_into(&mut session.refresh_token);
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> Result<Session, IdentityError> {
        let rejected = lock(&self.reject_password).clone();
        if let Some(message) = rejected {
            return Err(api_error(400, &message));
        }
        let mut session = sample_session("password-token");
        session.user = sample_user(email);
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.current_session().is_none() {
            return Ok(());
        }
        self.emit(AuthEvent::SignedOut, None);
        let failed = lock(&self.fail_sign_out).clone();
        match failed {
            Some(message) => Err(api_error(500, &message)),
            None => Ok(()),
        }
    }
}

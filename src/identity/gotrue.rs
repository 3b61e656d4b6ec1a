//! GoTrue-compatible identity client (`/auth/v1/*`).
//!
//! Thin HTTP wrapper around the hosted auth server. Every state-changing call
//! goes through [`GoTrueClient::commit`], which updates the cached session,
//! persists it when a [`SessionFile`] is attached, and broadcasts the change.
//! Pure helpers (`authorize_url`, `jwt_expiry`, `error_message`) are split out
//! for testability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use base64::Engine;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

use super::IdentityBackend;
use super::persist::SessionFile;
use super::types::{AuthChange, AuthEvent, IdentityError, OAuthProvider, Session, User};
use crate::config::{AppConfig, HttpTimeouts};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Sessions this close to expiry are refreshed before being handed out.
pub const REFRESH_MARGIN_SECS: i64 = 60;

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    current: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    store: Option<SessionFile>,
    initial_emitted: AtomicBool,
}

impl GoTrueClient {
    /// # Errors
    ///
    /// Returns [`IdentityError::HttpClientBuild`] if the HTTP client cannot
    /// be constructed.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            anon_key: anon_key.into(),
            current: Mutex::new(None),
            events,
            store: None,
            initial_emitted: AtomicBool::new(false),
        })
    }

    /// Build from app config, attaching session persistence if configured.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::HttpClientBuild`] if the HTTP client cannot
    /// be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, IdentityError> {
        let client = Self::new(&config.auth_url, &config.anon_key, config.timeouts)?;
        Ok(match &config.session_file {
            Some(path) => client.with_session_file(SessionFile::new(path)),
            None => client,
        })
    }

    #[must_use]
    pub fn with_session_file(mut self, store: SessionFile) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange the current refresh token for a new session.
    /// Returns `Ok(None)` when there is nothing to refresh.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the backend rejects the refresh token.
    pub async fn refresh_session(&self) -> Result<Option<Session>, IdentityError> {
        let Some(current) = self.current_session() else {
            return Ok(None);
        };
        let session = self.refresh_grant(&current.refresh_token).await?;
        self.commit(AuthEvent::TokenRefreshed, Some(session.clone())).await;
        Ok(Some(session))
    }

    /// Re-read the signed-in user from the backend. Emits `USER_UPDATED`
    /// and persists when the profile changed. Returns `Ok(None)` when there
    /// is no session.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the backend rejects the access token.
    pub async fn reload_user(&self) -> Result<Option<Session>, IdentityError> {
        let Some(mut session) = self.current_session() else {
            return Ok(None);
        };
        let user = self.fetch_user(&session.access_token).await?;
        if user != session.user {
            session.user = user;
            self.commit(AuthEvent::UserUpdated, Some(session.clone())).await;
        }
        Ok(Some(session))
    }

    fn set_current(&self, session: Option<Session>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Store, persist and broadcast one state change.
    async fn commit(&self, event: AuthEvent, session: Option<Session>) {
        self.set_current(session.clone());

        if let Some(store) = &self.store {
            let persisted = match &session {
                Some(s) => store.save(s).await,
                None => store.clear().await,
            };
            if let Err(e) = persisted {
                tracing::warn!(error = %e, %event, "session persistence failed");
            }
        }

        tracing::debug!(%event, signed_in = session.is_some(), "auth state change");
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthChange { event, session });
    }

    async fn restore(&self) -> Result<Option<Session>, IdentityError> {
        if let Some(session) = self.current_session() {
            return Ok(Some(session));
        }
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let restored = store.load().await?;
        if restored.is_some() {
            tracing::debug!(path = %store.path().display(), "restored persisted session");
            self.set_current(restored.clone());
        }
        Ok(restored)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        self.token_grant("refresh_token", &serde_json::json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn token_grant(&self, grant_type: &str, body: &serde_json::Value) -> Result<Session, IdentityError> {
        let resp = self
            .http
            .post(format!("{}/auth/v1/token?grant_type={grant_type}", self.base_url))
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        let session: Session = read_json(resp).await?;
        Ok(session.with_expiry_from(now_unix()))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let resp = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        read_json(resp).await
    }

    async fn revoke(&self, access_token: &str) -> Result<(), IdentityError> {
        let resp = self
            .http
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        // Already-invalid tokens mean the session is gone server-side.
        if resp.status().is_success() || matches!(status, 401 | 403 | 404) {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IdentityError::Api { status, message: error_message(status, &body) })
    }
}

#[async_trait::async_trait]
impl IdentityBackend for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let mut session = self.restore().await?;

        if let Some(stale) = session.clone().filter(|s| s.expires_within(now_unix(), REFRESH_MARGIN_SECS)) {
            match self.refresh_grant(&stale.refresh_token).await {
                Ok(fresh) => {
                    self.commit(AuthEvent::TokenRefreshed, Some(fresh.clone())).await;
                    session = Some(fresh);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stored session could not be refreshed; signing out locally");
                    self.commit(AuthEvent::SignedOut, None).await;
                    session = None;
                }
            }
        }

        if !self.initial_emitted.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(AuthChange { event: AuthEvent::InitialSession, session: session.clone() });
        }
        Ok(session)
    }

    fn current_session(&self) -> Option<Session> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
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
        if !skip_browser_redirect {
            tracing::debug!(%provider, "no browser surface attached; caller must open the authorization url");
        }
        authorize_url(&self.base_url, provider, redirect_to)
    }

    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, IdentityError> {
        let now = now_unix();
        let expires_at = jwt_expiry(access_token);

        let session = if expires_at.is_some_and(|at| at <= now) {
            tracing::debug!("access token already expired; refreshing before sign-in");
            self.refresh_grant(refresh_token).await?
        } else {
            let user = self.fetch_user(access_token).await?;
            Session {
                access_token: access_token.to_owned(),
                refresh_token: refresh_token.to_owned(),
                token_type: "bearer".to_owned(),
                expires_in: expires_at.map(|at| at - now),
                expires_at,
                user,
            }
        };

        self.commit(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let session = self
            .token_grant("password", &serde_json::json!({ "email": email, "password": password }))
            .await?;
        self.commit(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        let revoked = self.revoke(&session.access_token).await;
        self.commit(AuthEvent::SignedOut, None).await;
        revoked
    }
}

// =============================================================================
// PURE HELPERS
// =============================================================================

/// Build the provider authorization URL served by the auth server.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidUrl`] if `base_url` is not a valid URL.
pub fn authorize_url(base_url: &str, provider: OAuthProvider, redirect_to: &str) -> Result<String, IdentityError> {
    let url = reqwest::Url::parse_with_params(
        &format!("{}/auth/v1/authorize", base_url.trim_end_matches('/')),
        &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
    )
    .map_err(|e| IdentityError::InvalidUrl(e.to_string()))?;
    Ok(url.into())
}

/// Read the `exp` claim of a JWT without verifying it.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<i64> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok().map(|c| c.exp)
}

/// Pick the most specific human-readable message out of an error body.
#[must_use]
pub fn error_message(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error_description: Option<String>,
        msg: Option<String>,
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error_description.or(b.msg).or(b.message).or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed.starts_with('{') {
                format!("request failed with status {status}")
            } else {
                trimmed.to_owned()
            }
        })
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, IdentityError> {
    let status = resp.status().as_u16();
    let text = resp
        .text()
        .await
        .map_err(|e| IdentityError::Request(e.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(IdentityError::Api { status, message: error_message(status, &text) });
    }
    serde_json::from_str(&text).map_err(|e| IdentityError::Parse(e.to_string()))
}

pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;

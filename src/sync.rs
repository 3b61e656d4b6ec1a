//! Backend user sync: mirror the identity-backend user into the business
//! API's user table, and remember the result per email.
//!
//! DESIGN
//! ======
//! Two screens used to look the backend user up independently on mount and
//! on sign-in. [`BackendUserDirectory`] makes that idempotent: one
//! `OnceCell` per email, so concurrent callers share a single request and a
//! failed request leaves the cell empty for the next caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

use crate::api::{ApiClient, ApiError, BackendUser, CreateUserOutcome, NewUser};
use crate::identity::User;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("identity user has no email address")]
    MissingEmail,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Provider label used when the identity backend did not report one.
const DEFAULT_PROVIDER: &str = "EMAIL";

/// Backend record for an identity user: username is the email's local part,
/// provider is upper-cased.
#[must_use]
pub fn build_new_user(user: &User) -> Option<NewUser> {
    let email = user.email.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
    let username = email.split_once('@').map_or(email, |(local, _)| local);
    Some(NewUser {
        email: email.to_owned(),
        username: username.to_owned(),
        display_name: user.display_name().map(str::to_owned),
        avatar_url: user.avatar_url().map(str::to_owned),
        provider: user.provider().unwrap_or(DEFAULT_PROVIDER).to_uppercase(),
        provider_id: user.provider_id().map(str::to_owned),
    })
}

/// Create the backend user, or fetch the existing one on conflict.
///
/// # Errors
///
/// Returns [`SyncError::MissingEmail`] for users without an email, otherwise
/// the failing [`ApiError`].
pub async fn sync_user(api: &ApiClient, user: &User) -> Result<BackendUser, SyncError> {
    let record = build_new_user(user).ok_or(SyncError::MissingEmail)?;
    match api.create_user(&record).await? {
        CreateUserOutcome::Created(created) => {
            tracing::info!(email = %record.email, id = %created.id, "backend user created");
            Ok(created)
        }
        CreateUserOutcome::Conflict => {
            tracing::debug!(email = %record.email, "backend user exists; fetching by email");
            Ok(api.user_by_email(&record.email).await?)
        }
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// Memoized backend user lookups keyed by lowercased email.
#[derive(Default)]
pub struct BackendUserDirectory {
    entries: Mutex<HashMap<String, Arc<OnceCell<BackendUser>>>>,
}

fn key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl BackendUserDirectory {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<BackendUser>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backend user for `email`, fetching it at most once per success.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the fetch. Failures are not remembered.
    pub async fn lookup(&self, api: &ApiClient, email: &str) -> Result<BackendUser, ApiError> {
        let cell = Arc::clone(self.entries().entry(key(email)).or_default());
        cell.get_or_try_init(|| api.user_by_email(email)).await.cloned()
    }

    /// Run the create-or-fetch sync and remember its result.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] from [`sync_user`].
    pub async fn sync(&self, api: &ApiClient, user: &User) -> Result<BackendUser, SyncError> {
        let synced = sync_user(api, user).await?;
        self.seed(synced.clone());
        Ok(synced)
    }

    /// Remember `user` under its email.
    pub fn seed(&self, user: BackendUser) {
        let k = key(&user.email);
        self.entries().insert(k, Arc::new(OnceCell::new_with(Some(user))));
    }

    #[must_use]
    pub fn cached(&self, email: &str) -> Option<BackendUser> {
        self.entries().get(&key(email)).and_then(|cell| cell.get().cloned())
    }

    /// Forget everything. Called when the session goes away.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

/// Sync without letting a failure escape. The session is already valid, so
/// a backend mirroring failure is only logged.
pub async fn sync_best_effort(api: &ApiClient, users: Option<&BackendUserDirectory>, user: &User) -> Option<BackendUser> {
    let result = match users {
        Some(directory) => directory.sync(api, user).await,
        None => sync_user(api, user).await,
    };
    match result {
        Ok(synced) => Some(synced),
        Err(e) => {
            tracing::warn!(error = %e, user_id = %user.id, "backend user sync failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

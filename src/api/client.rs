//! HTTP client for the business API.

use futures::future::join_all;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::{
    BackendUser, Concert, ConcertWithPhotos, Dashboard, NewConcert, NewPhoto, NewUser, Notification, Photo, Setlist,
    SetlistInput,
};
use crate::config::{AppConfig, HttpTimeouts};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api request failed: {0}")]
    Request(String),

    /// Non-2xx answer. `message` is the body's own explanation when it had one.
    #[error("api returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("api response parse failed: {0}")]
    Parse(String),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// Rejected locally before any request was sent.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    /// Whether showing a retry button makes sense.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::HttpClientBuild(_) | Self::Validation(_) => false,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result of `POST /users`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateUserOutcome {
    Created(BackendUser),
    /// A user with that email already exists.
    Conflict,
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: impl Into<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned(), access_token: None })
    }

    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.timeouts)
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -------------------------------------------------------------------------
    // users
    // -------------------------------------------------------------------------

    /// `POST /users`. A `409` is reported as [`CreateUserOutcome::Conflict`]
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for transport failures and any other non-2xx.
    pub async fn create_user(&self, user: &NewUser) -> Result<CreateUserOutcome, ApiError> {
        let resp = self.send(Method::POST, "/users", Some(user)).await?;
        if resp.status() == StatusCode::CONFLICT {
            return Ok(CreateUserOutcome::Conflict);
        }
        read_json(resp).await.map(CreateUserOutcome::Created)
    }

    /// `GET /users/email/{email}`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn user_by_email(&self, email: &str) -> Result<BackendUser, ApiError> {
        self.get(&user_by_email_path(email)).await
    }

    // -------------------------------------------------------------------------
    // concerts
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn list_concerts(&self) -> Result<Vec<Concert>, ApiError> {
        self.get("/concerts").await
    }

    /// Validate locally, then `POST /concerts`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] for a blank artist or venue, otherwise
    /// an [`ApiError`] on transport failure or non-2xx.
    pub async fn create_concert(&self, concert: &NewConcert) -> Result<Concert, ApiError> {
        concert.validate().map_err(|m| ApiError::Validation(m.to_owned()))?;
        self.post("/concerts", concert).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn concerts_for_user(&self, user_id: &str) -> Result<Vec<Concert>, ApiError> {
        self.get(&format!("/concerts/user/{}", urlencoding::encode(user_id))).await
    }

    /// A user's concerts with their photos. Photo lists are fetched
    /// concurrently; one concert's failed photo fetch leaves only that
    /// concert without photos.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the concert list itself cannot be fetched.
    pub async fn concerts_with_photos(&self, user_id: &str) -> Result<Vec<ConcertWithPhotos>, ApiError> {
        let concerts = self.concerts_for_user(user_id).await?;
        let photos = join_all(concerts.iter().map(|c| self.photos_for_concert(&c.id))).await;

        Ok(concerts
            .into_iter()
            .zip(photos)
            .map(|(concert, photos)| {
                let photos = photos.unwrap_or_else(|e| {
                    tracing::warn!(concert_id = %concert.id, error = %e, "photo fetch failed; showing concert without photos");
                    Vec::new()
                });
                ConcertWithPhotos { concert, photos }
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // photos
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn create_photo(&self, photo: &NewPhoto) -> Result<Photo, ApiError> {
        self.post("/photos", photo).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn photos_for_concert(&self, concert_id: &str) -> Result<Vec<Photo>, ApiError> {
        self.get(&format!("/photos/concert/{}", urlencoding::encode(concert_id))).await
    }

    // -------------------------------------------------------------------------
    // setlists
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn list_setlists(&self) -> Result<Vec<Setlist>, ApiError> {
        self.get("/setlists").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn create_setlist(&self, setlist: &SetlistInput) -> Result<Setlist, ApiError> {
        self.post("/setlists", setlist).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn update_setlist(&self, id: &str, setlist: &SetlistInput) -> Result<Setlist, ApiError> {
        let path = format!("/setlists/{}", urlencoding::encode(id));
        read_json(self.send(Method::PUT, &path, Some(setlist)).await?).await
    }

    // -------------------------------------------------------------------------
    // notifications / dashboard
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn notifications_for_user(&self, user_id: &str) -> Result<Vec<Notification>, ApiError> {
        self.get(&format!("/notifications/user/{}", urlencoding::encode(user_id))).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or non-2xx.
    pub async fn dashboard(&self, user_id: &str) -> Result<Dashboard, ApiError> {
        self.get(&format!("/dashboard/{}", urlencoding::encode(user_id))).await
    }

    // -------------------------------------------------------------------------
    // plumbing
    // -------------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        read_json(self.send::<()>(Method::GET, path, None).await?).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        read_json(self.send(Method::POST, path, Some(body)).await?).await
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut req = self.http.request(method.clone(), format!("{}{path}", self.base_url));
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        tracing::debug!(%method, path, "api request");
        req.send().await.map_err(|e| ApiError::Request(e.to_string()))
    }
}

/// `/users/email/{email}` with the email percent-encoded as one segment.
#[must_use]
pub fn user_by_email_path(email: &str) -> String {
    format!("/users/email/{}", urlencoding::encode(email))
}

/// Human-readable message from an API error body.
#[must_use]
pub fn status_message(status: u16, body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('<') {
                format!("request failed with status {status}")
            } else {
                trimmed.to_owned()
            }
        })
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status().as_u16();
    let text = resp.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
    if !(200..300).contains(&status) {
        return Err(ApiError::Status { status, message: status_message(status, &text) });
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

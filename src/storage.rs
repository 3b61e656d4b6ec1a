//! Object storage for concert photos (`/storage/v1/object/*`).

use crate::api::{ApiClient, ApiError, NewPhoto, Photo};
use crate::config::{AppConfig, HttpTimeouts};

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(String),

    #[error("upload rejected ({status}): {message}")]
    Upload { status: u16, message: String },

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    #[error("invalid object path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// `image/<ext>` from the file name, `image/jpeg` when there is no extension.
#[must_use]
pub fn content_type_for(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_alphanumeric() || c == '_') => {
            format!("image/{ext}")
        }
        _ => DEFAULT_CONTENT_TYPE.to_owned(),
    }
}

/// `<user_id>/<concert_id>/<file_name>`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidPath`] if any segment is empty or contains
/// a `/`.
pub fn photo_object_path(user_id: &str, concert_id: &str, file_name: &str) -> Result<String, StorageError> {
    for segment in [user_id, concert_id, file_name] {
        if segment.is_empty() || segment.contains('/') || segment == ".." {
            return Err(StorageError::InvalidPath(segment.to_owned()));
        }
    }
    Ok(format!("{user_id}/{concert_id}/{file_name}"))
}

fn encode_path(path: &str) -> String {
    path.split('/').map(|s| urlencoding::encode(s).into_owned()).collect::<Vec<_>>().join("/")
}

pub struct ObjectStorage {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl ObjectStorage {
    /// # Errors
    ///
    /// Returns [`StorageError::HttpClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        bucket: impl Into<String>,
        timeouts: HttpTimeouts,
    ) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| StorageError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            anon_key: anon_key.into(),
            bucket: bucket.into(),
        })
    }

    /// # Errors
    ///
    /// Returns [`StorageError::HttpClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        Self::new(&config.auth_url, &config.anon_key, &config.storage_bucket, config.timeouts)
    }

    /// Store `bytes` at `path` in the bucket, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on transport failure or a non-2xx answer.
    pub async fn upload(&self, access_token: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, encode_path(path));
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .bearer_auth(access_token)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        if resp.status().is_success() {
            tracing::debug!(path, content_type, "object uploaded");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StorageError::Upload { status, message: crate::api::client::status_message(status, &body) })
    }

    /// Public URL of an object. No request is made.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, encode_path(path))
    }

    /// Upload a concert photo and register it with the business API.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the path is invalid, the upload fails, or
    /// the API rejects the photo record.
    pub async fn upload_concert_photo(&self, api: &ApiClient, upload: PhotoUpload<'_>) -> Result<Photo, StorageError> {
        let path = photo_object_path(upload.user_id, upload.concert_id, upload.file_name)?;
        let content_type = content_type_for(upload.file_name);
        self.upload(upload.access_token, &path, upload.bytes, &content_type).await?;

        let photo = NewPhoto {
            concert_id: upload.concert_id.to_owned(),
            user_id: upload.user_id.to_owned(),
            url: self.public_url(&path),
            caption: upload.caption,
        };
        Ok(api.create_photo(&photo).await?)
    }
}

/// Arguments to [`ObjectStorage::upload_concert_photo`].
pub struct PhotoUpload<'a> {
    pub access_token: &'a str,
    pub user_id: &'a str,
    pub concert_id: &'a str,
    pub file_name: &'a str,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

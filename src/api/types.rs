//! Business-API payloads. The remote API speaks camelCase JSON and ISO-8601
//! dates; ids come back as either strings or numbers depending on the table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Ids arrive as `"12"` or `12` depending on the table.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn id_from_any<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    RawId::deserialize(de).map(String::from)
}

fn opt_id_from_any<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(de)?.map(String::from))
}

// =============================================================================
// USERS
// =============================================================================

/// The business API's own record of a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// Body of `POST /users`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub provider_id: Option<String>,
}

// =============================================================================
// CONCERTS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concert {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_id_from_any")]
    pub user_id: Option<String>,
    pub artist: String,
    #[serde(default)]
    pub tour_name: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    pub date_time: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub setlist: Option<String>,
}

impl Concert {
    /// Parsed `dateTime`, if the API sent valid RFC 3339.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.date_time)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}

/// Shown when the concert form is submitted without its required fields.
pub const CONCERT_REQUIRED_FIELDS: &str = "Please fill in Artist and Venue fields.";

/// Body of `POST /concerts`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConcert {
    pub user_id: String,
    pub artist: String,
    pub venue: String,
    /// Serialized as RFC 3339.
    pub date_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tour_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setlist: Option<String>,
}

impl NewConcert {
    #[must_use]
    pub fn new(user_id: impl Into<String>, artist: impl Into<String>, venue: impl Into<String>, date_time: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            artist: artist.into(),
            venue: venue.into(),
            date_time,
            tour_name: None,
            city: None,
            country: None,
            genre: None,
            notes: None,
            setlist: None,
        }
    }

    /// Artist and venue must be non-blank. Returns the form message if not.
    ///
    /// # Errors
    ///
    /// Returns [`CONCERT_REQUIRED_FIELDS`] when either field is blank.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.artist.trim().is_empty() || self.venue.trim().is_empty() {
            return Err(CONCERT_REQUIRED_FIELDS);
        }
        Ok(())
    }
}

// =============================================================================
// PHOTOS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Body of `POST /photos`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhoto {
    pub concert_id: String,
    pub user_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// A concert together with its photos, as the concerts tab renders it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConcertWithPhotos {
    pub concert: Concert,
    pub photos: Vec<Photo>,
}

// =============================================================================
// SETLISTS
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetlistSong {
    pub title: String,
    #[serde(default)]
    pub favorite: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setlist {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_id_from_any")]
    pub concert_id: Option<String>,
    #[serde(default)]
    pub songs: Vec<SetlistSong>,
}

impl Setlist {
    pub fn favorites(&self) -> impl Iterator<Item = &SetlistSong> {
        self.songs.iter().filter(|s| s.favorite)
    }
}

/// Body of `POST /setlists` and `PUT /setlists/{id}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetlistInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concert_id: Option<String>,
    pub songs: Vec<SetlistSong>,
}

// =============================================================================
// NOTIFICATIONS / DASHBOARD
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    /// e.g. `concert_alert`, `artist_update`, `friend_activity`.
    #[serde(default)]
    pub kind: Option<String>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// `(label, count)` pair used by every dashboard breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub label: String,
    pub count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dashboard {
    pub total_concerts: u64,
    pub most_seen_artist: Option<CountEntry>,
    pub top_venues: Vec<CountEntry>,
    pub top_cities: Vec<CountEntry>,
    pub genres: Vec<CountEntry>,
    /// Concerts per period, oldest first.
    pub concerts_over_time: Vec<CountEntry>,
    pub favorite_songs: Vec<CountEntry>,
}

// =============================================================================
// LOADABLE
// =============================================================================

/// What a data screen shows: a spinner, an error with retry, or the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Loadable<T> {
    Loading,
    Failed { message: String },
    Loaded(T),
}

impl<T> Loadable<T> {
    /// Collapse a fetch result into a screen state.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Loaded(value),
            Err(e) => Self::Failed { message: e.to_string() },
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Only failed loads offer a retry.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Re-run `fetch`, passing through `Loading` first.
    pub async fn reload<F, Fut, E>(&mut self, fetch: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        *self = Self::Loading;
        *self = Self::from_result(fetch().await);
    }
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Self::Loading
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;

//! Remote business API: users, concerts, photos, setlists, notifications and
//! the dashboard. Thin typed wrappers over the HTTP endpoints.

pub mod client;
pub mod types;

pub use client::{ApiClient, ApiError, CreateUserOutcome};
pub use types::{
    BackendUser, Concert, ConcertWithPhotos, Dashboard, Loadable, NewConcert, NewPhoto, NewUser, Notification, Photo,
    Setlist, SetlistInput, SetlistSong,
};

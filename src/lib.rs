//! Client core for the concert log app.
//!
//! ARCHITECTURE
//! ============
//! The identity backend issues sessions and announces changes on a
//! broadcast channel. [`session::SessionProvider`] is the only writer of the
//! shared [`session::AuthState`]; the navigation guard and screens read it
//! through `watch` receivers. The OAuth hand-off turns a browser redirect
//! into a session and then mirrors the user into the business API.

pub mod api;
pub mod config;
pub mod identity;
pub mod login;
pub mod nav;
pub mod oauth;
pub mod session;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod testing;

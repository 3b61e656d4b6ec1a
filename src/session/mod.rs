//! Session Provider and the shared auth snapshot it publishes.

pub mod provider;
pub mod state;

pub use provider::SessionProvider;
pub use state::AuthState;

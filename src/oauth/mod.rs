//! OAuth hand-off: turn a provider redirect into a local session.
//!
//! ARCHITECTURE
//! ============
//! Parsing is pure ([`extract_tokens`]) so it can be tested without a
//! network. The side-effecting flow ([`OAuthHandoff`]) talks to the identity
//! backend and a host [`BrowserSession`], and never writes auth state
//! itself: the session provider picks the new session up from the
//! backend's change events.

pub mod handoff;
pub mod parse;

pub use handoff::{BrowserOutcome, BrowserSession, HandoffError, HandoffOutcome, OAuthHandoff};
pub use parse::{TokenPair, extract_tokens, fragment_params};

//! Navigation Guard: keeps signed-out users on the login screen and
//! signed-in users off it.
//!
//! DESIGN
//! ======
//! [`decide`] is the pure rule. [`NavigationGuard`] wraps it with a memo of
//! the last `(state, route)` input so re-evaluating unchanged inputs can
//! never redirect twice. Redirects always replace the current route.

use super::navigator::Navigator;
use super::route::Route;
use crate::session::AuthState;

/// What the guard knows about the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardState {
    /// Still loading. Not the same as signed out.
    Unknown,
    Unauthenticated,
    Authenticated,
}

impl From<&AuthState> for GuardState {
    fn from(state: &AuthState) -> Self {
        if state.is_loading() {
            Self::Unknown
        } else if state.is_authenticated() {
            Self::Authenticated
        } else {
            Self::Unauthenticated
        }
    }
}

/// Redirect target for `current` under `state`, if any.
#[must_use]
pub fn decide(state: GuardState, current: Route) -> Option<Route> {
    match (state, current) {
        (GuardState::Unknown, _) | (GuardState::Unauthenticated, Route::Login) => None,
        (GuardState::Unauthenticated, _) => Some(Route::Login),
        (GuardState::Authenticated, Route::Login | Route::Index) => Some(Route::LANDING),
        (GuardState::Authenticated, _) => None,
    }
}

/// Tabs to show: every protected screen when signed in, only login
/// otherwise. The index route is never listed.
#[must_use]
pub fn visible_routes(is_authenticated: bool) -> Vec<Route> {
    if is_authenticated {
        Route::PROTECTED.to_vec()
    } else {
        vec![Route::Login]
    }
}

#[derive(Debug, Default)]
pub struct NavigationGuard {
    last: Option<(GuardState, Route)>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// [`decide`], except an input identical to the previous one yields no
    /// action.
    pub fn evaluate(&mut self, state: GuardState, current: Route) -> Option<Route> {
        let input = (state, current);
        if self.last == Some(input) {
            return None;
        }
        self.last = Some(input);
        decide(state, current)
    }

    /// Evaluate against `nav`'s current route and perform the redirect.
    pub fn apply<N: Navigator + ?Sized>(&mut self, auth: &AuthState, nav: &mut N) -> Option<Route> {
        let state = GuardState::from(auth);
        let from = nav.current();
        let target = self.evaluate(state, from)?;
        tracing::debug!(%from, to = %target, "guard redirect");
        nav.replace(target);
        // The redirect target is itself an allowed route for this state.
        self.last = Some((state, target));
        Some(target)
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;

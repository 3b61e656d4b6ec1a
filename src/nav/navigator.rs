//! Navigation seam plus an in-memory history and a guard-enforcing wrapper.

use tokio::sync::watch;

use super::guard::NavigationGuard;
use super::route::Route;
use crate::session::AuthState;

/// The host's navigation stack.
pub trait Navigator {
    fn current(&self) -> Route;

    /// Open `route` on top of the current one.
    fn push(&mut self, route: Route);

    /// Swap the current route for `route`; back skips the old one.
    fn replace(&mut self, route: Route);

    /// Pop one entry. Returns false when already at the root.
    fn back(&mut self) -> bool;
}

/// Stack-backed [`Navigator`].
#[derive(Clone, Debug)]
pub struct MemoryNavigator {
    stack: Vec<Route>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(initial: Route) -> Self {
        Self { stack: vec![initial] }
    }

    /// Bottom-to-top history.
    #[must_use]
    pub fn history(&self) -> &[Route] {
        &self.stack
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(Route::Index)
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> Route {
        self.stack.last().copied().unwrap_or(Route::Index)
    }

    fn push(&mut self, route: Route) {
        self.stack.push(route);
    }

    fn replace(&mut self, route: Route) {
        match self.stack.last_mut() {
            Some(top) => *top = route,
            None => self.stack.push(route),
        }
    }

    fn back(&mut self) -> bool {
        if self.stack.len() <= 1 {
            return false;
        }
        self.stack.pop();
        true
    }
}

// =============================================================================
// GUARDED NAVIGATOR
// =============================================================================

/// A [`Navigator`] that re-runs the guard after every route change and on
/// every auth-state change it is told about.
pub struct GuardedNavigator<N> {
    inner: N,
    guard: NavigationGuard,
    auth: watch::Receiver<AuthState>,
}

impl<N: Navigator> GuardedNavigator<N> {
    /// Wrap `inner` and run the guard once against the current state.
    pub fn new(inner: N, auth: watch::Receiver<AuthState>) -> Self {
        let mut nav = Self { inner, guard: NavigationGuard::new(), auth };
        nav.refresh();
        nav
    }

    /// Re-run the guard against the latest auth snapshot.
    pub fn refresh(&mut self) -> Option<Route> {
        let state = self.auth.borrow_and_update().clone();
        self.guard.apply(&state, &mut self.inner)
    }

    /// Wait for the next auth-state change and react to it. Returns `None`
    /// once the session provider is gone.
    pub async fn next_change(&mut self) -> Option<Option<Route>> {
        self.auth.changed().await.ok()?;
        Some(self.refresh())
    }

    /// React to auth changes until the session provider is dropped.
    pub async fn follow_auth(&mut self) {
        while self.next_change().await.is_some() {}
    }

    #[must_use]
    pub fn inner(&self) -> &N {
        &self.inner
    }

    #[must_use]
    pub fn into_inner(self) -> N {
        self.inner
    }
}

impl<N: Navigator> Navigator for GuardedNavigator<N> {
    fn current(&self) -> Route {
        self.inner.current()
    }

    fn push(&mut self, route: Route) {
        self.inner.push(route);
        self.refresh();
    }

    fn replace(&mut self, route: Route) {
        self.inner.replace(route);
        self.refresh();
    }

    fn back(&mut self) -> bool {
        let moved = self.inner.back();
        if moved {
            self.refresh();
        }
        moved
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;

//! Routes, the Navigation Guard and the navigation seam.

pub mod guard;
pub mod navigator;
pub mod route;

pub use guard::{GuardState, NavigationGuard, decide, visible_routes};
pub use navigator::{GuardedNavigator, MemoryNavigator, Navigator};
pub use route::Route;

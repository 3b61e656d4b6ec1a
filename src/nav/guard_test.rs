use super::*;
use crate::nav::MemoryNavigator;
use crate::testing::sample_session;

const ALL: [Route; 9] = [
    Route::Index,
    Route::Login,
    Route::UserConcerts,
    Route::ConcertLog,
    Route::LogConcert,
    Route::SetLists,
    Route::Dashboard,
    Route::Notifications,
    Route::Profile,
];

#[test]
fn guard_state_from_auth_state() {
    assert_eq!(GuardState::from(&AuthState::loading()), GuardState::Unknown);
    assert_eq!(GuardState::from(&AuthState::signed_out()), GuardState::Unauthenticated);
    assert_eq!(GuardState::from(&AuthState::signed_in(sample_session("AAA"))), GuardState::Authenticated);
}

#[test]
fn unknown_never_redirects() {
    for route in ALL {
        assert_eq!(decide(GuardState::Unknown, route), None, "{route}");
    }
}

#[test]
fn unauthenticated_goes_to_login_from_everywhere_else() {
    for route in ALL {
        let expected = if route == Route::Login { None } else { Some(Route::Login) };
        assert_eq!(decide(GuardState::Unauthenticated, route), expected, "{route}");
    }
}

#[test]
fn authenticated_leaves_login_and_index() {
    assert_eq!(decide(GuardState::Authenticated, Route::Login), Some(Route::LANDING));
    assert_eq!(decide(GuardState::Authenticated, Route::Index), Some(Route::LANDING));
    for route in Route::PROTECTED {
        assert_eq!(decide(GuardState::Authenticated, route), None, "{route}");
    }
}

#[test]
fn visible_routes_agree_with_guard() {
    let signed_in = visible_routes(true);
    assert!(!signed_in.contains(&Route::Login));
    assert!(!signed_in.contains(&Route::Index));
    for route in &signed_in {
        assert!(route.is_protected());
        assert_eq!(decide(GuardState::Authenticated, *route), None);
    }

    assert_eq!(visible_routes(false), vec![Route::Login]);
}

#[test]
fn identical_input_redirects_once() {
    let mut guard = NavigationGuard::new();
    assert_eq!(guard.evaluate(GuardState::Authenticated, Route::Login), Some(Route::LANDING));
    assert_eq!(guard.evaluate(GuardState::Authenticated, Route::Login), None);
    assert_eq!(guard.evaluate(GuardState::Authenticated, Route::Login), None);
}

#[test]
fn sign_in_on_login_redirects_exactly_once() {
    let mut guard = NavigationGuard::new();
    let mut nav = MemoryNavigator::new(Route::Login);

    assert_eq!(guard.apply(&AuthState::loading(), &mut nav), None);
    assert_eq!(guard.apply(&AuthState::signed_out(), &mut nav), None);

    let signed_in = AuthState::signed_in(sample_session("AAA"));
    assert_eq!(guard.apply(&signed_in, &mut nav), Some(Route::LANDING));
    for _ in 0..3 {
        assert_eq!(guard.apply(&signed_in, &mut nav), None);
    }
    assert_eq!(nav.history(), [Route::LANDING]);
}

#[test]
fn sign_out_on_protected_redirects_exactly_once() {
    let mut guard = NavigationGuard::new();
    let mut nav = MemoryNavigator::new(Route::LANDING);
    nav.push(Route::Dashboard);

    let signed_in = AuthState::signed_in(sample_session("AAA"));
    assert_eq!(guard.apply(&signed_in, &mut nav), None);

    let signed_out = AuthState::signed_out();
    assert_eq!(guard.apply(&signed_out, &mut nav), Some(Route::Login));
    assert_eq!(guard.apply(&signed_out, &mut nav), None);
    assert_eq!(nav.history(), [Route::LANDING, Route::Login]);
}

#[test]
fn returning_to_a_protected_route_is_redirected_again() {
    let mut guard = NavigationGuard::new();
    let mut nav = MemoryNavigator::new(Route::Dashboard);
    let signed_out = AuthState::signed_out();

    assert_eq!(guard.apply(&signed_out, &mut nav), Some(Route::Login));
    nav.push(Route::Dashboard);
    assert_eq!(guard.apply(&signed_out, &mut nav), Some(Route::Login));
}

#[test]
fn loading_holds_position_then_index_resolves() {
    let mut guard = NavigationGuard::new();
    let mut nav = MemoryNavigator::default();

    assert_eq!(guard.apply(&AuthState::loading(), &mut nav), None);
    assert_eq!(nav.current(), Route::Index);

    assert_eq!(guard.apply(&AuthState::signed_out(), &mut nav), Some(Route::Login));
    assert_eq!(nav.history(), [Route::Login]);
}

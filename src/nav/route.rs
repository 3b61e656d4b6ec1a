//! The app's screens and which of them require a session.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Entry point. Never shown; only decides where to go first.
    Index,
    Login,
    UserConcerts,
    ConcertLog,
    LogConcert,
    SetLists,
    Dashboard,
    Notifications,
    Profile,
}

impl Route {
    /// Where a signed-in user lands.
    pub const LANDING: Route = Route::UserConcerts;

    /// Tab order of the protected screens.
    pub const PROTECTED: [Route; 7] = [
        Route::UserConcerts,
        Route::ConcertLog,
        Route::LogConcert,
        Route::SetLists,
        Route::Dashboard,
        Route::Notifications,
        Route::Profile,
    ];

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Index => "/",
            Self::Login => "/login",
            Self::UserConcerts => "/userConcerts",
            Self::ConcertLog => "/concertLog",
            Self::LogConcert => "/logConcertScreen",
            Self::SetLists => "/setLists",
            Self::Dashboard => "/dashboard",
            Self::Notifications => "/notifications",
            Self::Profile => "/profile",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Index => "Home",
            Self::Login => "Login",
            Self::UserConcerts => "My Concerts",
            Self::ConcertLog => "Concerts",
            Self::LogConcert => "Log Concert",
            Self::SetLists => "Set Lists",
            Self::Dashboard => "Dashboard",
            Self::Notifications => "Notifications",
            Self::Profile => "Profile",
        }
    }

    #[must_use]
    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Index | Self::Login)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = String;

    /// Accepts the path with or without its leading `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('/');
        [Self::Index, Self::Login]
            .into_iter()
            .chain(Self::PROTECTED)
            .find(|r| r.path().trim_start_matches('/') == wanted)
            .ok_or_else(|| format!("unknown route: {s}"))
    }
}

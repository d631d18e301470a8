//! Route guard: which pages the current session may see.
//!
//! Enforcement here is independent of the navigation list; hiding a link
//! never substitutes for denying the route itself.

use crate::session::{Role, Session};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    TimeLogs,
    EodReports,
    Trainings,
    Sops,
    LeaveRequests,
    Announcements,
    Users,
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Dashboard,
        Route::TimeLogs,
        Route::EodReports,
        Route::Trainings,
        Route::Sops,
        Route::LeaveRequests,
        Route::Announcements,
        Route::Users,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Dashboard => "/dashboard",
            Route::TimeLogs => "/time-logs",
            Route::EodReports => "/eod-reports",
            Route::Trainings => "/trainings",
            Route::Sops => "/sops",
            Route::LeaveRequests => "/leave-requests",
            Route::Announcements => "/announcements",
            Route::Users => "/users",
        }
    }

    /// Parse a location path. Query strings, fragments and a trailing slash
    /// are ignored; matching is exact otherwise.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim();
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn admin_only(self) -> bool {
        matches!(self, Route::Users)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Process-wide authentication state, derived from the session store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Role),
}

impl AuthState {
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            Some(s) => AuthState::Authenticated(s.role),
            None => AuthState::Unauthenticated,
        }
    }
}

pub fn can_access(route: Route, session: Option<&Session>) -> bool {
    match AuthState::of(session) {
        AuthState::Unauthenticated => false,
        AuthState::Authenticated(Role::Admin) => true,
        AuthState::Authenticated(Role::Member) => !route.admin_only(),
    }
}

/// Where a navigation request ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No session: only the credential form is reachable.
    Login,
    Page(Route),
    /// Unknown path or insufficient role; `requested` is `None` for unknown paths.
    Redirect { requested: Option<Route>, to: Route },
}

impl Resolution {
    pub fn route(self) -> Option<Route> {
        match self {
            Resolution::Login => None,
            Resolution::Page(route) | Resolution::Redirect { to: route, .. } => Some(route),
        }
    }

    pub fn outcome(self) -> &'static str {
        match self {
            Resolution::Login => "login",
            Resolution::Page(_) => "page",
            Resolution::Redirect {
                requested: None, ..
            } => "unknown_route",
            Resolution::Redirect {
                requested: Some(_),
                ..
            } => "denied",
        }
    }
}

/// Resolve a path for the given session. `landing` answers `/` and must be
/// reachable by every authenticated role; denied and unknown paths always
/// fall back to the dashboard.
pub fn resolve(path: &str, session: Option<&Session>, landing: Route) -> Resolution {
    if session.is_none() {
        return Resolution::Login;
    }
    if is_root(path) {
        return Resolution::Page(landing);
    }
    match Route::from_path(path) {
        Some(route) if can_access(route, session) => Resolution::Page(route),
        requested => Resolution::Redirect {
            requested,
            to: Route::Dashboard,
        },
    }
}

fn is_root(path: &str) -> bool {
    let path = path.trim();
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.is_empty() || path == "/"
}

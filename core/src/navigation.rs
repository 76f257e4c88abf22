use crate::state::{Role, SessionState};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "route", content = "id")]
pub enum Route {
    Login,
    Signup,
    Homepage,
    Herd,
    AddCattle,
    VetProfile,
    VetNotifications,
    NotificationDetail(String),
}

impl Route {
    /// Routes reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }

    pub fn home_for(role: Role) -> Self {
        match role {
            Role::Farmer => Self::Homepage,
            Role::Vet => Self::VetProfile,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => f.write_str("login"),
            Self::Signup => f.write_str("signup"),
            Self::Homepage => f.write_str("homepage"),
            Self::Herd => f.write_str("herd"),
            Self::AddCattle => f.write_str("add-cattle"),
            Self::VetProfile => f.write_str("vet-profile"),
            Self::VetNotifications => f.write_str("vet-notifications"),
            Self::NotificationDetail(id) => write!(f, "notification/{id}"),
        }
    }
}

/// Back stack driven by the published session state.
#[derive(Debug, Clone)]
pub struct Navigator {
    root: Route,
    above: Vec<Route>,
    authenticated: bool,
}

impl Navigator {
    /// Pick the first screen for the given session.
    pub fn start(state: &SessionState) -> Self {
        let root = if state.is_authenticated {
            Route::home_for(state.role())
        } else {
            Route::Login
        };
        Self {
            root,
            above: Vec::new(),
            authenticated: state.is_authenticated,
        }
    }

    pub fn current(&self) -> &Route {
        self.above.last().unwrap_or(&self.root)
    }

    /// Screens from the root up to the current one.
    pub fn stack(&self) -> Vec<Route> {
        std::iter::once(&self.root)
            .chain(&self.above)
            .cloned()
            .collect()
    }

    /// Push `route` unless it is already on top; protected routes fall back to login.
    pub fn navigate(&mut self, route: Route) {
        if !self.authenticated && !route.is_public() {
            debug!(%route, "blocked navigation without a session");
            self.reset(Route::Login);
            return;
        }
        if self.current() != &route {
            self.above.push(route);
        }
    }

    /// Pop one screen; returns false at the root.
    pub fn back(&mut self) -> bool {
        self.above.pop().is_some()
    }

    pub fn on_session_change(&mut self, state: &SessionState) {
        self.authenticated = state.is_authenticated;
        if !state.is_authenticated {
            let at_login = self.root == Route::Login && self.above.is_empty();
            if !at_login && self.current() != &Route::Signup {
                debug!("session ended, returning to login");
                self.reset(Route::Login);
            }
        } else if self.current().is_public() {
            let home = Route::home_for(state.role());
            debug!(%home, "session started");
            self.reset(home);
        }
    }

    fn reset(&mut self, root: Route) {
        self.root = root;
        self.above.clear();
    }
}

//! Route authorization.
//!
//! [`decide`] is the pure decision the router consults on every navigation.
//! [`Navigator`] wraps it with the current route and a session subscription
//! so the decision is recomputed whenever the session changes, including a
//! forced logout triggered by the transport.

use tokio::sync::watch;

use crate::session::SessionState;
use crate::store::SessionStore;

/// Access requirement of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteAccess {
    /// Any signed-in user.
    Authenticated,
    /// Administrators only.
    AdminOnly,
}

impl RouteAccess {
    /// Returns true if the route is admin-only.
    #[must_use]
    pub fn requires_admin(&self) -> bool {
        matches!(self, Self::AdminOnly)
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardDecision {
    /// The session is still being restored; show a neutral placeholder.
    Loading,
    /// Render the route.
    Render,
    /// Not signed in.
    RedirectToLogin,
    /// Signed in, but the role is insufficient for this route.
    RedirectToDefault,
}

impl GuardDecision {
    /// Returns the redirect this decision calls for, if any.
    #[must_use]
    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            Self::RedirectToLogin => Some(Redirect::ToLogin),
            Self::RedirectToDefault => Some(Redirect::ToDefault),
            Self::Loading | Self::Render => None,
        }
    }
}

/// Navigation request emitted outside the router, e.g. by the transport
/// after a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Redirect {
    /// Go to the login route.
    ToLogin,
    /// Go to the default route.
    ToDefault,
}

/// Decides whether a route may render for the given session state.
#[must_use]
pub fn decide(state: &SessionState, requires_admin: bool) -> GuardDecision {
    match state {
        SessionState::Rehydrating => GuardDecision::Loading,
        SessionState::Anonymous { .. } | SessionState::Authenticating => {
            GuardDecision::RedirectToLogin
        }
        SessionState::Authenticated(session) => {
            if !requires_admin || session.is_admin() {
                GuardDecision::Render
            } else {
                GuardDecision::RedirectToDefault
            }
        }
    }
}

/// A route the user is trying to view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route path, e.g. `/students`.
    pub path: String,
    /// Access requirement.
    pub access: RouteAccess,
}

impl Route {
    /// A route open to any signed-in user.
    #[must_use]
    pub fn authenticated(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            access: RouteAccess::Authenticated,
        }
    }

    /// An admin-only route.
    #[must_use]
    pub fn admin_only(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            access: RouteAccess::AdminOnly,
        }
    }
}

/// Tracks the current route and keeps its authorization decision fresh.
#[derive(Debug)]
pub struct Navigator {
    session: SessionStore,
    changes: watch::Receiver<SessionState>,
    current: Option<Route>,
    login_path: String,
    default_path: String,
}

impl Navigator {
    /// Creates a navigator bound to a session store.
    #[must_use]
    pub fn new(
        session: SessionStore,
        login_path: impl Into<String>,
        default_path: impl Into<String>,
    ) -> Self {
        let changes = session.subscribe();
        Self {
            session,
            changes,
            current: None,
            login_path: login_path.into(),
            default_path: default_path.into(),
        }
    }

    /// Moves to `route` and returns the decision for it.
    pub fn navigate(&mut self, route: Route) -> GuardDecision {
        self.current = Some(route);
        let _ = self.changes.borrow_and_update();
        self.decision().unwrap_or(GuardDecision::Loading)
    }

    /// Returns the current route, if any.
    #[must_use]
    pub fn current_route(&self) -> Option<&Route> {
        self.current.as_ref()
    }

    /// Evaluates the current route against the session state as it is now.
    #[must_use]
    pub fn decision(&self) -> Option<GuardDecision> {
        let route = self.current.as_ref()?;
        Some(decide(
            &self.session.current(),
            route.access.requires_admin(),
        ))
    }

    /// Waits for the next session transition and returns the fresh decision
    /// for the current route.
    ///
    /// Returns `None` if no route has been navigated yet. The navigator keeps
    /// its store alive, so the wait itself always ends in a transition.
    pub async fn changed(&mut self) -> Option<GuardDecision> {
        self.changes.changed().await.ok()?;
        let _ = self.changes.borrow_and_update();
        self.decision()
    }

    /// Returns the path a redirect leads to.
    #[must_use]
    pub fn target(&self, redirect: Redirect) -> &str {
        match redirect {
            Redirect::ToLogin => &self.login_path,
            Redirect::ToDefault => &self.default_path,
        }
    }
}

//! Routes, role-based guards and the navigation shell.

use std::fmt;

use helpline_client::{SessionContext, SessionEvent};
use helpline_core::{allows, Action, Role};
use tokio::sync::watch;

/// A console screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Sign-in form.
    Login,
    /// Self-registration form.
    Register,
    /// Summary statistics.
    Dashboard,
    /// Contact directory.
    Contacts,
    /// Contact creation.
    NewContact,
    /// Call list.
    Calls,
    /// Call logging.
    NewCall,
    /// User administration.
    Admin,
}

impl Route {
    /// Every route.
    pub const ALL: [Self; 8] = [
        Self::Login,
        Self::Register,
        Self::Dashboard,
        Self::Contacts,
        Self::NewContact,
        Self::Calls,
        Self::NewCall,
        Self::Admin,
    ];

    /// Routes shown in the navigation bar, in display order.
    pub const NAV_ITEMS: [Self; 4] = [Self::Dashboard, Self::Contacts, Self::Calls, Self::Admin];

    /// URL path of the route.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Dashboard => "/dashboard",
            Self::Contacts => "/contacts",
            Self::NewContact => "/contacts/new",
            Self::Calls => "/calls",
            Self::NewCall => "/calls/new",
            Self::Admin => "/admin",
        }
    }

    /// Navigation label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::Register => "Register",
            Self::Dashboard => "Dashboard",
            Self::Contacts => "Contacts",
            Self::NewContact => "New Contact",
            Self::Calls => "Calls",
            Self::NewCall => "Log Call",
            Self::Admin => "Admin",
        }
    }

    /// Route for a path, ignoring a trailing slash. `/` maps to the dashboard.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Some(Self::Dashboard);
        }
        Self::ALL.into_iter().find(|r| r.path() == trimmed)
    }

    /// Returns `true` for routes reachable without a session.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }

    /// Capability needed to open the route, if any.
    #[must_use]
    pub const fn required_action(self) -> Option<Action> {
        match self {
            Self::Login | Self::Register => None,
            Self::Dashboard => Some(Action::ViewDashboard),
            Self::Contacts => Some(Action::ViewContacts),
            Self::NewContact => Some(Action::ManageContacts),
            Self::Calls => Some(Action::ViewCalls),
            Self::NewCall => Some(Action::LogCall),
            Self::Admin => Some(Action::ManageUsers),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Where a request for `route` actually lands for the given role.
///
/// `None` means signed out.
#[must_use]
pub const fn guard(route: Route, role: Option<Role>) -> Route {
    match role {
        None if route.is_public() => route,
        None => Route::Login,
        Some(_) if route.is_public() => Route::Dashboard,
        Some(role) => match route.required_action() {
            Some(action) if !allows(role, action) => Route::Dashboard,
            _ => route,
        },
    }
}

/// Navigation items the role can reach.
#[must_use]
pub fn visible_nav(role: Role) -> Vec<Route> {
    Route::NAV_ITEMS
        .into_iter()
        .filter(|r| r.required_action().map_or(true, |a| allows(role, a)))
        .collect()
}

/// Tracks the current route and reacts to session changes.
#[derive(Debug)]
pub struct NavigationShell {
    session: SessionContext,
    events: watch::Receiver<SessionEvent>,
    current: Route,
}

impl NavigationShell {
    /// Create a shell positioned according to the current session.
    #[must_use]
    pub fn new(session: SessionContext) -> Self {
        let events = session.subscribe();
        let current = guard(Route::Dashboard, session.role());
        Self {
            session,
            events,
            current,
        }
    }

    /// The current route.
    #[must_use]
    pub const fn current(&self) -> Route {
        self.current
    }

    /// Navigate, applying the guard. Returns where the shell ended up.
    pub fn navigate(&mut self, route: Route) -> Route {
        let target = guard(route, self.session.role());
        if target != route {
            tracing::debug!(requested = %route, redirected = %target, "Route guarded");
        }
        self.current = target;
        target
    }

    /// Visible navigation for the current session.
    #[must_use]
    pub fn nav_items(&self) -> Vec<Route> {
        self.session.role().map(visible_nav).unwrap_or_default()
    }

    /// Apply any session change that has happened since the last call.
    ///
    /// Returns the new route if the change forced a redirect.
    pub fn poll(&mut self) -> Option<Route> {
        match self.events.has_changed() {
            Ok(true) => {
                let event = self.events.borrow_and_update().clone();
                self.apply(&event)
            }
            _ => None,
        }
    }

    /// Wait for the next session change and apply it.
    ///
    /// Returns `None` if the session context has gone away.
    pub async fn next_redirect(&mut self) -> Option<Route> {
        loop {
            self.events.changed().await.ok()?;
            let event = self.events.borrow_and_update().clone();
            if let Some(route) = self.apply(&event) {
                return Some(route);
            }
        }
    }

    fn apply(&mut self, event: &SessionEvent) -> Option<Route> {
        let target = match event {
            SessionEvent::Expired | SessionEvent::SignedOut => Route::Login,
            SessionEvent::SignedIn(_) => guard(self.current, self.session.role()),
            SessionEvent::Initial => return None,
        };
        if target == self.current {
            return None;
        }
        if matches!(event, SessionEvent::Expired) {
            tracing::info!("Session expired, returning to login");
        }
        self.current = target;
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_client::mock::fixtures;
    use helpline_client::Session;

    fn session_for(role: Role) -> SessionContext {
        SessionContext::signed_in(Session {
            token: "tok".into(),
            user: fixtures::user("u-1", "Ana Agent", role),
        })
    }

    #[test]
    fn paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/"), Some(Route::Dashboard));
        assert_eq!(Route::from_path("/calls/"), Some(Route::Calls));
        assert_eq!(Route::from_path("/nowhere"), None);
    }

    #[test]
    fn signed_out_goes_to_login() {
        assert_eq!(guard(Route::Calls, None), Route::Login);
        assert_eq!(guard(Route::Register, None), Route::Register);
        assert_eq!(guard(Route::Login, None), Route::Login);
    }

    #[test]
    fn signed_in_skips_public_routes() {
        assert_eq!(guard(Route::Login, Some(Role::Agent)), Route::Dashboard);
        assert_eq!(guard(Route::Register, Some(Role::Admin)), Route::Dashboard);
    }

    #[test]
    fn capability_guard() {
        assert_eq!(guard(Route::Admin, Some(Role::Agent)), Route::Dashboard);
        assert_eq!(guard(Route::Admin, Some(Role::Supervisor)), Route::Dashboard);
        assert_eq!(guard(Route::Admin, Some(Role::Admin)), Route::Admin);
        assert_eq!(guard(Route::NewCall, Some(Role::Agent)), Route::NewCall);
    }

    #[test]
    fn nav_by_role() {
        assert_eq!(
            visible_nav(Role::Admin),
            vec![Route::Dashboard, Route::Contacts, Route::Calls, Route::Admin]
        );
        assert_eq!(
            visible_nav(Role::Agent),
            vec![Route::Dashboard, Route::Contacts, Route::Calls]
        );
    }

    #[test]
    fn expiry_redirects_to_login() {
        let session = session_for(Role::Agent);
        let mut shell = NavigationShell::new(session.clone());
        assert_eq!(shell.navigate(Route::Calls), Route::Calls);
        assert_eq!(shell.poll(), None);

        session.expire();
        assert_eq!(shell.poll(), Some(Route::Login));
        assert_eq!(shell.current(), Route::Login);
        assert!(shell.nav_items().is_empty());
    }

    #[tokio::test]
    async fn next_redirect_waits_for_expiry() {
        let session = session_for(Role::Supervisor);
        let mut shell = NavigationShell::new(session.clone());
        shell.navigate(Route::Contacts);

        let waiter = tokio::spawn(async move { shell.next_redirect().await });
        session.expire();
        assert_eq!(waiter.await.unwrap(), Some(Route::Login));
    }
}

//! Route table and navigation guard.
//!
//! The guard only reads [`SessionFlags`]; deciding a navigation never changes
//! the session.

use crate::models::Role;
use crate::session::SessionFlags;

pub const LOGIN_PATH: &str = "/login";
pub const ADMIN_HOME: &str = "/admin";
pub const CLIENT_HOME: &str = "/dashboard";
pub const NOT_FOUND: &str = "not-found";

/// Access requirements attached to a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
    pub requires_admin: bool,
    pub requires_client: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        requires_guest: false,
        requires_admin: false,
        requires_client: false,
    };
    pub const GUEST: Self = Self {
        requires_guest: true,
        ..Self::PUBLIC
    };
    pub const AUTH: Self = Self {
        requires_auth: true,
        ..Self::PUBLIC
    };
    pub const ADMIN: Self = Self {
        requires_auth: true,
        requires_admin: true,
        ..Self::PUBLIC
    };
    pub const CLIENT: Self = Self {
        requires_auth: true,
        requires_client: true,
        ..Self::PUBLIC
    };
}

/// One entry of the route table. `:name` segments match any single segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub path: &'static str,
    pub meta: RouteMeta,
}

impl Route {
    pub const fn new(name: &'static str, path: &'static str, meta: RouteMeta) -> Self {
        Self { name, path, meta }
    }

    fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(self.path);
        let mut actual = segments(path);
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(p), Some(a)) if p.starts_with(':') || p == a => continue,
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Outcome of guarding a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed,
    /// Sign in first, then come back to `return_to`
    RedirectToLogin { return_to: String },
    /// Already signed in; go to the role's landing page
    RedirectToHome { path: &'static str },
    NotFound,
}

impl Navigation {
    /// Location to send the browser to, if the navigation is redirected.
    pub fn location(&self) -> Option<String> {
        match self {
            Navigation::Proceed | Navigation::NotFound => None,
            Navigation::RedirectToLogin { return_to } => {
                Some(format!("{}?redirect={}", LOGIN_PATH, urlencoding::encode(return_to)))
            }
            Navigation::RedirectToHome { path } => Some((*path).to_string()),
        }
    }
}

/// Landing page for a signed-in role.
pub fn home_for(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Admin) => ADMIN_HOME,
        _ => CLIENT_HOME,
    }
}

/// Decide whether a navigation to `requested_path` may go ahead.
pub fn guard(meta: &RouteMeta, requested_path: &str, flags: &SessionFlags) -> Navigation {
    if meta.requires_auth && !flags.is_authenticated {
        return Navigation::RedirectToLogin {
            return_to: requested_path.to_string(),
        };
    }
    if meta.requires_guest && flags.is_authenticated {
        return Navigation::RedirectToHome {
            path: home_for(flags.role()),
        };
    }
    if meta.requires_admin && !flags.is_admin {
        return Navigation::NotFound;
    }
    if meta.requires_client && !flags.is_client {
        return Navigation::NotFound;
    }
    Navigation::Proceed
}

/// Declarative route table.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(vec![
            Route::new("home", "/", RouteMeta::AUTH),
            Route::new("login", LOGIN_PATH, RouteMeta::GUEST),
            Route::new("register", "/register", RouteMeta::GUEST),
            Route::new("profile", "/profile", RouteMeta::AUTH),
            // Admin area
            Route::new("admin-dashboard", ADMIN_HOME, RouteMeta::ADMIN),
            Route::new("admin-users", "/admin/users", RouteMeta::ADMIN),
            Route::new("admin-sales", "/admin/sales", RouteMeta::ADMIN),
            Route::new("admin-tickets", "/admin/tickets", RouteMeta::ADMIN),
            Route::new("admin-ticket", "/admin/tickets/:id", RouteMeta::ADMIN),
            // Merchant area
            Route::new("dashboard", CLIENT_HOME, RouteMeta::CLIENT),
            Route::new("invoices", "/invoices", RouteMeta::CLIENT),
            Route::new("sales", "/sales", RouteMeta::CLIENT),
            Route::new("tickets", "/tickets", RouteMeta::CLIENT),
            Route::new("ticket", "/tickets/:id", RouteMeta::CLIENT),
            Route::new("apikeys", "/apikeys", RouteMeta::CLIENT),
            Route::new("payments", "/payments", RouteMeta::CLIENT),
            Route::new("tpv", "/tpv", RouteMeta::CLIENT),
        ])
    }
}

const NOT_FOUND_ROUTE: Route = Route::new(NOT_FOUND, "/:path", RouteMeta::PUBLIC);

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route matching `path` (query and fragment ignored), or the catch-all.
    pub fn resolve(&self, path: &str) -> &Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        self.routes
            .iter()
            .find(|r| r.matches(path))
            .unwrap_or(&NOT_FOUND_ROUTE)
    }

    /// Resolve `path` and run the guard for it.
    pub fn navigate(&self, path: &str, flags: &SessionFlags) -> (&Route, Navigation) {
        let route = self.resolve(path);
        let decision = guard(&route.meta, path, flags);
        tracing::debug!("Navigation to {} ({}): {:?}", path, route.name, decision);
        (route, decision)
    }
}

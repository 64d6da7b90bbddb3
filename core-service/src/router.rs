//! # Routes and Navigation Guard
//!
//! The host router owns history and rendering; this module decides where a
//! transition may go. Every transition runs through
//! [`NavigationGuard::before_each`], which resolves the path against
//! [`ROUTES`], computes the document title and returns a [`GuardDecision`]
//! from the session's current auth state.
//!
//! Redirects that originate outside the router (a forced logout) arrive as
//! [`NavigationEvent::RedirectRequested`] on the event bus. The guard turns
//! them into decisions published through
//! [`NavigationGuard::subscribe_redirects`], adding the page the user was on
//! as the `redirect` query parameter of the login route.

use core_auth::manager::LOGIN_ROUTE;
use core_auth::SessionManager;
use core_runtime::events::{CoreEvent, EventBus, EventStream, NavigationEvent, RecvError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::form_urlencoded;

pub const APP_TITLE: &str = "Quiz Master";

/// Query parameter carrying the destination a login should return to.
pub const REDIRECT_QUERY_KEY: &str = "redirect";

pub const LANDING_ROUTE: &str = "landing";
pub const USER_HOME_ROUTE: &str = "user.dashboard";
pub const ADMIN_HOME_ROUTE: &str = "admin.dashboard";

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    /// Only signed-out users (login, register).
    Guest,
    Authenticated,
    /// Authenticated with the admin role.
    Admin,
}

impl Access {
    pub fn requires_auth(self) -> bool {
        matches!(self, Access::Authenticated | Access::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    /// Absolute path; `:name` segments capture a parameter.
    pub pattern: &'static str,
    pub title: Option<&'static str>,
    pub access: Access,
}

const fn route(
    name: &'static str,
    pattern: &'static str,
    title: &'static str,
    access: Access,
) -> Route {
    Route {
        name,
        pattern,
        title: Some(title),
        access,
    }
}

pub const ROUTES: &[Route] = &[
    route("landing", "/", "Welcome to Quiz Master", Access::Public),
    route("login", "/login", "Login", Access::Guest),
    route("register", "/register", "Register", Access::Guest),
    route("user.dashboard", "/dashboard", "Dashboard", Access::Authenticated),
    route("user.subjects", "/subjects", "Subjects", Access::Authenticated),
    route(
        "user.quizzes",
        "/subjects/:subjectId/quizzes",
        "Quizzes",
        Access::Authenticated,
    ),
    route("user.takeQuiz", "/quiz/:quizId", "Take Quiz", Access::Authenticated),
    route("user.results", "/results", "My Results", Access::Authenticated),
    route(
        "admin.dashboard",
        "/admin/dashboard",
        "Admin Dashboard",
        Access::Admin,
    ),
    route("admin.subjects", "/admin/subjects", "Manage Subjects", Access::Admin),
    route(
        "admin.chapters",
        "/admin/subjects/:subjectId/chapters",
        "Manage Chapters",
        Access::Admin,
    ),
    route(
        "admin.quizzes",
        "/admin/chapters/:chapterId/quizzes",
        "Manage Quizzes",
        Access::Admin,
    ),
    route(
        "admin.questions",
        "/admin/quizzes/:quizId/questions",
        "Manage Questions",
        Access::Admin,
    ),
    route("admin.users", "/admin/users", "Manage Users", Access::Admin),
    route("admin.reports", "/admin/reports", "Reports", Access::Admin),
];

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

impl Route {
    pub fn by_name(name: &str) -> Option<&'static Route> {
        ROUTES.iter().find(|route| route.name == name)
    }

    fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();
        let mut wanted = segments(self.pattern);
        let mut given = segments(path);

        loop {
            match (wanted.next(), given.next()) {
                (None, None) => return Some(params),
                (Some(pattern), Some(value)) => match pattern.strip_prefix(':') {
                    Some(param) => {
                        params.insert(param.to_string(), value.to_string());
                    }
                    None if pattern == value => {}
                    None => return None,
                },
                _ => return None,
            }
        }
    }

    /// Builds a path for this route, or `None` when a parameter is missing.
    pub fn href(
        &self,
        params: &BTreeMap<String, String>,
        query: &BTreeMap<String, String>,
    ) -> Option<String> {
        let mut path = String::new();
        for segment in segments(self.pattern) {
            path.push('/');
            match segment.strip_prefix(':') {
                Some(param) => path.push_str(params.get(param)?),
                None => path.push_str(segment),
            }
        }
        if path.is_empty() {
            path.push('/');
        }

        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            path.push('?');
            path.push_str(&encoded);
        }
        Some(path)
    }
}

/// A path matched against [`ROUTES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub route: Route,
    /// Path and query as requested, fragment removed.
    pub full_path: String,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

/// Matches `full_path` (which may carry a query string) to a route.
pub fn resolve(full_path: &str) -> Option<ResolvedRoute> {
    let without_fragment = full_path.split('#').next().unwrap_or_default();
    let (path, raw_query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, query),
        None => (without_fragment, ""),
    };

    ROUTES.iter().find_map(|route| {
        route.captures(path).map(|params| ResolvedRoute {
            route: *route,
            full_path: without_fragment.to_string(),
            params,
            query: form_urlencoded::parse(raw_query.as_bytes())
                .into_owned()
                .collect(),
        })
    })
}

/// `"<title> | Quiz Master"`, or the bare app title.
pub fn document_title(route: Option<&Route>) -> String {
    match route.and_then(|route| route.title) {
        Some(title) => format!("{} | {}", title, APP_TITLE),
        None => APP_TITLE.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    Proceed,
    Redirect {
        route: String,
        query: BTreeMap<String, String>,
    },
}

impl GuardDecision {
    pub fn redirect(route: &str) -> Self {
        GuardDecision::Redirect {
            route: route.to_string(),
            query: BTreeMap::new(),
        }
    }

    /// Redirect to login, returning to `destination` afterwards.
    pub fn login_then(destination: &str) -> Self {
        GuardDecision::Redirect {
            route: LOGIN_ROUTE.to_string(),
            query: BTreeMap::from([(REDIRECT_QUERY_KEY.to_string(), destination.to_string())]),
        }
    }
}

/// Access check for entering `target` with the given auth state.
pub fn decide(target: &ResolvedRoute, authenticated: bool, admin: bool) -> GuardDecision {
    let access = target.route.access;

    if access.requires_auth() {
        if !authenticated {
            return GuardDecision::login_then(&target.full_path);
        }
        if access == Access::Admin && !admin {
            return GuardDecision::redirect(USER_HOME_ROUTE);
        }
    }

    if access == Access::Guest && authenticated {
        let home = if admin { ADMIN_HOME_ROUTE } else { USER_HOME_ROUTE };
        return GuardDecision::redirect(home);
    }

    GuardDecision::Proceed
}

/// Outcome of one transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub title: String,
    pub decision: GuardDecision,
    /// `None` for paths outside the route table.
    pub route: Option<ResolvedRoute>,
}

struct GuardInner {
    session: SessionManager,
    current: Mutex<Option<ResolvedRoute>>,
    redirects: watch::Sender<Option<GuardDecision>>,
}

impl GuardInner {
    fn current(&self) -> MutexGuard<'_, Option<ResolvedRoute>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Gates route transitions on the session's auth state.
#[derive(Clone)]
pub struct NavigationGuard {
    inner: Arc<GuardInner>,
}

impl NavigationGuard {
    pub fn new(session: SessionManager) -> Self {
        Self {
            inner: Arc::new(GuardInner {
                session,
                current: Mutex::new(None),
                redirects: watch::channel(None).0,
            }),
        }
    }

    /// Decides whether the router may enter `full_path`.
    ///
    /// Paths outside the route table redirect to the landing page. A
    /// transition that proceeds becomes the current route.
    #[instrument(skip(self))]
    pub fn before_each(&self, full_path: &str) -> Transition {
        let Some(target) = resolve(full_path) else {
            debug!("Unknown path, redirecting to landing");
            return Transition {
                title: document_title(None),
                decision: GuardDecision::redirect(LANDING_ROUTE),
                route: None,
            };
        };

        let decision = decide(
            &target,
            self.inner.session.is_authenticated(),
            self.inner.session.is_admin(),
        );

        match &decision {
            GuardDecision::Proceed => {
                *self.inner.current() = Some(target.clone());
            }
            GuardDecision::Redirect { route, .. } => {
                info!(from = target.route.name, to = %route, "Navigation redirected");
            }
        }

        Transition {
            title: document_title(Some(&target.route)),
            decision,
            route: Some(target),
        }
    }

    /// Route of the last transition that proceeded.
    pub fn current(&self) -> Option<ResolvedRoute> {
        self.inner.current().clone()
    }

    /// Decision for a redirect requested outside the router.
    ///
    /// Login redirects remember the protected page the user was on unless
    /// the request already names a destination.
    pub fn redirect_for(&self, route: &str, mut query: BTreeMap<String, String>) -> GuardDecision {
        if route == LOGIN_ROUTE && !query.contains_key(REDIRECT_QUERY_KEY) {
            if let Some(current) = self.inner.current().as_ref() {
                if current.route.access.requires_auth() {
                    query.insert(REDIRECT_QUERY_KEY.to_string(), current.full_path.clone());
                }
            }
        }

        GuardDecision::Redirect {
            route: route.to_string(),
            query,
        }
    }

    /// Latest redirect raised outside the router; `None` until the first.
    pub fn subscribe_redirects(&self) -> watch::Receiver<Option<GuardDecision>> {
        self.inner.redirects.subscribe()
    }

    /// Forwards `RedirectRequested` events from `event_bus` to
    /// [`subscribe_redirects`](Self::subscribe_redirects).
    ///
    /// Subscribes before returning, so events emitted afterwards are never
    /// missed. The task runs until the bus closes or the handle is aborted.
    pub fn listen(&self, event_bus: &EventBus) -> JoinHandle<()> {
        let mut stream = EventStream::new(event_bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Navigation(_)));
        let guard = self.clone();

        tokio::spawn(async move {
            loop {
                match stream.recv().await {
                    Ok(CoreEvent::Navigation(NavigationEvent::RedirectRequested {
                        route,
                        query,
                    })) => {
                        let decision = guard.redirect_for(&route, query);
                        info!(route = %route, "Redirect requested outside the router");
                        guard.inner.redirects.send_replace(Some(decision));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Navigation listener lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Navigation listener stopped");
        })
    }
}

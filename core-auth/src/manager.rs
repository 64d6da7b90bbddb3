//! # Session Manager
//!
//! Owns the signed-in session and the token refresh protocol.
//!
//! ## Overview
//!
//! The [`SessionManager`] keeps the access token, refresh token and user
//! profile in memory, mirrors every change to the [`CredentialStore`], and
//! publishes an [`AuthSnapshot`] for guards and views. It is cheap to clone;
//! every clone drives the same session.
//!
//! ## Single-flight refresh
//!
//! Any number of callers may ask for a refresh at once. The first caller
//! spawns the refresh task and parks a shared handle to its outcome in the
//! in-flight slot; later callers await that handle instead of contacting the
//! backend again. The task owns a guard that empties the slot when it ends,
//! whether it succeeded, failed, timed out or was dropped by a runtime
//! shutdown, so the manager always returns to [`RefreshState::Idle`].
//!
//! ```text
//!  caller A ──┐
//!  caller B ──┼──> in-flight slot ──> [ spawned refresh task ] ──> POST /auth/refresh
//!  caller C ──┘        (shared outcome)          │
//!                                                └─ guard drop: slot = None
//! ```
//!
//! ## Failure policy
//!
//! - 401/403 from the refresh call, or no refresh token at all, ends the
//!   session: credentials are wiped, a session-expired notification is shown
//!   and a redirect to the login view is requested after a short delay.
//! - Network failures, 5xx responses and malformed refresh bodies leave the
//!   session intact and show a server-problem warning.
//! - A logout that lands while the refresh is in flight wins; the refresh
//!   result is discarded.
//!
//! ## Usage
//!
//! ```ignore
//! let manager = SessionManager::new(transport, store, notifications, event_bus, settings);
//! manager.restore().await;
//!
//! let session = manager.login(&Credentials::email("a@b.com", "secret")).await?;
//! let token = manager.refresh().await?;
//! manager.logout().await;
//! ```

use crate::credential_store::CredentialStore;
use crate::error::{ApiError, AuthError, RefreshFailure, Result};
use crate::transport::{decode_json, ApiTransport, PendingRequest};
use crate::types::{
    AuthSnapshot, Credentials, LoginResponse, RefreshResponse, RefreshState, RegisterRequest,
    Session, UserProfile,
};
use core_runtime::config::{
    CoreConfig, DEFAULT_PROBE_TIMEOUT, DEFAULT_REDIRECT_DELAY, DEFAULT_REFRESH_TIMEOUT,
};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, NavigationEvent};
use core_runtime::notifications::{NotificationCategory, NotificationCenter, Severity};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
pub const SERVER_PROBLEM_MESSAGE: &str = "There was a problem with the server. Please try again.";
pub const LOGGED_OUT_MESSAGE: &str = "You have been logged out successfully";
pub const REGISTERED_MESSAGE: &str =
    "Registration successful! Please log in with your credentials.";

/// Route name the manager asks the router to show after a forced logout.
pub const LOGIN_ROUTE: &str = "login";

/// Timing knobs for the session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Deadline for `POST /auth/refresh`.
    pub refresh_timeout: Duration,
    /// Deadline for `GET /auth/user` session probes.
    pub probe_timeout: Duration,
    /// Pause between a forced logout and the login redirect.
    pub redirect_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
        }
    }
}

impl From<&CoreConfig> for SessionSettings {
    fn from(config: &CoreConfig) -> Self {
        Self {
            refresh_timeout: config.timeouts.refresh,
            probe_timeout: config.timeouts.probe,
            redirect_delay: config.logout_redirect_delay,
        }
    }
}

type RefreshOutcome = std::result::Result<String, RefreshFailure>;
type RefreshFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    generation: u64,
    outcome: RefreshFlight,
}

struct SessionInner {
    transport: ApiTransport,
    store: CredentialStore,
    session: RwLock<Session>,
    snapshot: watch::Sender<AuthSnapshot>,
    notifications: NotificationCenter,
    event_bus: EventBus,
    settings: SessionSettings,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    logging_out: AtomicBool,
}

/// Empties the in-flight slot when the refresh task ends or is dropped.
struct FlightGuard {
    inner: Arc<SessionInner>,
    generation: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut slot = self.inner.slot();
        if slot
            .as_ref()
            .is_some_and(|flight| flight.generation == self.generation)
        {
            *slot = None;
            debug!(generation = self.generation, "Refresh state reset to idle");
        }
    }
}

/// Process-wide owner of the authenticated session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Creates a signed-out manager. Call [`restore`](Self::restore) to load
    /// a persisted session.
    pub fn new(
        transport: ApiTransport,
        store: CredentialStore,
        notifications: NotificationCenter,
        event_bus: EventBus,
        settings: SessionSettings,
    ) -> Self {
        let (snapshot, _) = watch::channel(AuthSnapshot::default());
        Self {
            inner: Arc::new(SessionInner {
                transport,
                store,
                session: RwLock::new(Session::default()),
                snapshot,
                notifications,
                event_bus,
                settings,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                logging_out: AtomicBool::new(false),
            }),
        }
    }

    /// Reloads the session persisted by a previous run.
    ///
    /// Storage failures are logged and leave the manager signed out.
    #[instrument(skip(self))]
    pub async fn restore(&self) {
        let loaded = match self.inner.store.load().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session; starting signed out");
                Session::default()
            }
        };

        let mut session = self.inner.session.write().await;
        *session = loaded;
        info!(
            authenticated = session.is_authenticated(),
            admin = session.is_admin(),
            "Session restored"
        );
        self.inner.publish(&session);
    }

    /// Exchanges credentials for a session.
    #[instrument(skip(self, credentials), fields(login = %credentials.identifier()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let request = PendingRequest::post("/auth/login")
            .json(credentials)?
            .anonymous()
            .ignore_auth_error();

        let response = match self.inner.transport.dispatch(&request, None).await {
            Ok(response) => response,
            Err(e) if matches!(e.status(), Some(400 | 401)) => {
                let message = e
                    .body_field("error")
                    .unwrap_or("Login failed")
                    .to_string();
                warn!(status = e.status(), "Login rejected");
                self.inner.notifications.add_with_category(
                    message.clone(),
                    Severity::Error,
                    NotificationCategory::Validation,
                );
                return Err(AuthError::InvalidCredentials(message));
            }
            Err(e) => {
                error!(error = %e, "Login request failed");
                return Err(e.into());
            }
        };

        let body: LoginResponse = decode_json(&response)?;
        let (Some(access_token), Some(refresh_token)) = (
            body.access_token.filter(|token| !token.is_empty()),
            body.refresh_token.filter(|token| !token.is_empty()),
        ) else {
            error!("Login response is missing tokens");
            return Err(AuthError::MalformedResponse(
                "Invalid response from server - missing tokens".to_string(),
            ));
        };

        let new_session = Session {
            access_token,
            refresh_token,
            user: body.user,
        };

        {
            let mut session = self.inner.session.write().await;
            *session = new_session.clone();
            if let Err(e) = self.inner.store.save(&session).await {
                warn!(error = %e, "Failed to persist session; continuing in memory");
            }
            self.inner.publish(&session);
        }
        self.inner.logging_out.store(false, Ordering::SeqCst);

        let user_id = new_session.user.as_ref().and_then(|user| user.id);
        let role = new_session
            .user
            .as_ref()
            .map(|user| user.role.to_string())
            .unwrap_or_default();
        info!(user_id, role = %role, "Login successful");
        self.inner.emit(AuthEvent::LoggedIn { user_id, role });

        Ok(new_session)
    }

    /// Creates an account. The caller still has to log in afterwards.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile> {
        let payload = request.payload();
        let pending = PendingRequest::post("/auth/register")
            .json(&payload)?
            .anonymous()
            .ignore_auth_error();

        let response = match self.inner.transport.dispatch(&pending, None).await {
            Ok(response) => response,
            Err(e) => {
                let message = e
                    .body_field("error")
                    .or_else(|| e.body_field("message"))
                    .unwrap_or("Registration failed")
                    .to_string();
                warn!(status = e.status(), error = %e, "Registration failed");
                self.inner.notifications.add_with_category(
                    message,
                    Severity::Error,
                    NotificationCategory::Validation,
                );
                return Err(e.into());
            }
        };

        let user: UserProfile = decode_json(&response)?;
        info!(user_id = user.id, "Registration successful");
        self.inner.notifications.add(REGISTERED_MESSAGE, Severity::Success);
        self.inner.emit(AuthEvent::Registered {
            username: payload.username.to_string(),
        });
        Ok(user)
    }

    /// Ends the session. Never fails; storage errors are logged.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.inner.notifications.clear();
        self.inner.end_session().await;
        self.inner.notifications.add_with_category(
            LOGGED_OUT_MESSAGE,
            Severity::Success,
            NotificationCategory::Logout,
        );
        info!("User logged out");
    }

    /// Obtains a fresh access token, joining a refresh that is already in
    /// flight instead of starting a second one.
    pub async fn refresh(&self) -> std::result::Result<String, RefreshFailure> {
        let (flight, start) = {
            let mut slot = self.inner.slot();
            match slot.as_ref() {
                Some(flight) => {
                    debug!(generation = flight.generation, "Joining in-flight token refresh");
                    (flight.outcome.clone(), None)
                }
                None => {
                    let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let (tx, rx) = oneshot::channel();
                    let outcome = async move {
                        rx.await.unwrap_or(Err(RefreshFailure::Aborted))
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        generation,
                        outcome: outcome.clone(),
                    });
                    (outcome, Some((generation, tx)))
                }
            }
        };

        if let Some((generation, tx)) = start {
            debug!(generation, "Starting token refresh");
            let guard = FlightGuard {
                inner: Arc::clone(&self.inner),
                generation,
            };
            tokio::spawn(async move {
                let inner = Arc::clone(&guard.inner);
                let outcome = inner.run_refresh().await;
                drop(guard);
                let _ = tx.send(outcome);
            });
        }

        flight.await
    }

    /// Verifies the stored token against `GET /auth/user`.
    ///
    /// Returns `Ok(None)` when no token is stored. A 401/403 ends the session
    /// without a notification and returns [`AuthError::SessionExpired`];
    /// other failures leave the session untouched and are returned as-is.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) -> Result<Option<UserProfile>> {
        let token = self.inner.session.read().await.access_token.clone();
        if token.is_empty() {
            debug!("No token found; ensuring signed-out state");
            self.inner.end_session().await;
            return Ok(None);
        }

        match self.inner.probe(&token).await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_auth_rejection() => {
                info!(status = e.status(), "Stored token rejected; signing out");
                self.inner.end_session().await;
                Err(AuthError::SessionExpired)
            }
            Err(e) => {
                warn!(error = %e, "Auth check failed; keeping current session");
                Err(e.into())
            }
        }
    }

    /// Like [`check_auth`](Self::check_auth) but answers with a flag.
    ///
    /// Only a 401/403 reports `false` for a stored token; unreachable backends
    /// give the session the benefit of the doubt. `silent` suppresses the
    /// session-expired notification.
    #[instrument(skip(self))]
    pub async fn validate_session(&self, silent: bool) -> bool {
        let token = self.inner.session.read().await.access_token.clone();
        if token.is_empty() {
            return false;
        }

        match self.inner.probe(&token).await {
            Ok(_) => true,
            Err(e) if e.is_auth_rejection() => {
                info!(status = e.status(), "Session invalid; signing out");
                self.inner.end_session().await;
                if !silent {
                    self.inner.notifications.add_with_category(
                        SESSION_EXPIRED_MESSAGE,
                        Severity::Error,
                        NotificationCategory::SessionExpired,
                    );
                }
                false
            }
            Err(e) => {
                warn!(error = %e, "Session validation inconclusive; keeping session");
                true
            }
        }
    }

    /// Current access token, empty when signed out.
    pub async fn access_token(&self) -> String {
        self.inner.session.read().await.access_token.clone()
    }

    pub async fn session(&self) -> Session {
        self.inner.session.read().await.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.snapshot.borrow().authenticated
    }

    pub fn is_admin(&self) -> bool {
        self.inner.snapshot.borrow().admin
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.snapshot.borrow().user.clone()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receives a new [`AuthSnapshot`] after every session change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn refresh_state(&self) -> RefreshState {
        if self.inner.slot().is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// True between a forced logout and its login redirect.
    pub fn is_logging_out(&self) -> bool {
        self.inner.logging_out.load(Ordering::SeqCst)
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.inner.notifications
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub(crate) fn transport(&self) -> &ApiTransport {
        &self.inner.transport
    }
}

impl SessionInner {
    fn slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn publish(&self, session: &Session) {
        self.snapshot.send_replace(AuthSnapshot::from(session));
    }

    async fn run_refresh(self: Arc<Self>) -> RefreshOutcome {
        let outcome = self.exchange_refresh_token().await;
        if let Err(failure) = &outcome {
            self.handle_refresh_failure(failure).await;
        }
        outcome
    }

    async fn exchange_refresh_token(&self) -> RefreshOutcome {
        let refresh_token = self.session.read().await.refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(RefreshFailure::MissingRefreshToken);
        }

        self.emit(AuthEvent::TokenRefreshing);
        let request = PendingRequest::post("/auth/refresh")
            .ignore_auth_error()
            .timeout(self.settings.refresh_timeout);

        let response = self
            .transport
            .dispatch(&request, Some(&refresh_token))
            .await
            .map_err(|e| match e.status() {
                Some(status @ (401 | 403)) => RefreshFailure::Rejected(status),
                _ => RefreshFailure::Transport(e),
            })?;

        let body: RefreshResponse = decode_json(&response).map_err(|e| {
            warn!(error = %e, "Refresh response is not valid JSON");
            RefreshFailure::MalformedResponse
        })?;
        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or(RefreshFailure::MalformedResponse)?;
        let rotated = body
            .refresh_token
            .filter(|token| !token.is_empty() && *token != refresh_token);

        {
            let mut session = self.session.write().await;
            if session.refresh_token != refresh_token {
                info!("Session ended during refresh; discarding new token");
                return Err(RefreshFailure::SessionEnded);
            }

            session.access_token = access_token.clone();
            if let Err(e) = self.store.save_access_token(&access_token).await {
                warn!(error = %e, "Failed to persist refreshed access token");
            }
            if let Some(token) = &rotated {
                session.refresh_token = token.clone();
                if let Err(e) = self.store.save_refresh_token(token).await {
                    warn!(error = %e, "Failed to persist rotated refresh token");
                }
            }
            self.publish(&session);
        }

        info!(rotated = rotated.is_some(), "Access token refreshed");
        self.emit(AuthEvent::TokenRefreshed {
            rotated: rotated.is_some(),
        });
        Ok(access_token)
    }

    async fn handle_refresh_failure(self: &Arc<Self>, failure: &RefreshFailure) {
        match failure {
            RefreshFailure::SessionEnded | RefreshFailure::Aborted => {
                debug!(error = %failure, "Refresh abandoned");
            }
            failure if failure.is_terminal() => {
                warn!(error = %failure, "Refresh rejected; ending session");
                self.emit(AuthEvent::RefreshFailed {
                    message: failure.to_string(),
                    terminal: true,
                });
                self.expire_session().await;
            }
            failure => {
                warn!(error = %failure, "Refresh failed; keeping session");
                self.notifications.add_with_category(
                    SERVER_PROBLEM_MESSAGE,
                    Severity::Warning,
                    NotificationCategory::ServerProblem,
                );
                self.emit(AuthEvent::RefreshFailed {
                    message: failure.to_string(),
                    terminal: false,
                });
            }
        }
    }

    /// Forced logout after the backend rejected our credentials.
    ///
    /// Only the first caller acts; the flag stays set until the login
    /// redirect has been requested.
    async fn expire_session(self: &Arc<Self>) {
        if self.logging_out.swap(true, Ordering::SeqCst) {
            debug!("Forced logout already in progress");
            return;
        }

        self.end_session().await;
        self.notifications.add_with_category(
            SESSION_EXPIRED_MESSAGE,
            Severity::Error,
            NotificationCategory::SessionExpired,
        );
        self.emit(AuthEvent::SessionExpired);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(inner.settings.redirect_delay).await;
            let _ = inner
                .event_bus
                .emit(CoreEvent::Navigation(NavigationEvent::RedirectRequested {
                    route: LOGIN_ROUTE.to_string(),
                    query: BTreeMap::new(),
                }));
            inner.logging_out.store(false, Ordering::SeqCst);
            debug!("Login redirect requested");
        });
    }

    /// Clears memory and storage. Storage errors are logged, not returned.
    async fn end_session(&self) {
        let mut session = self.session.write().await;
        let was_authenticated = session.is_authenticated();
        *session = Session::default();
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        self.publish(&session);
        drop(session);

        if was_authenticated {
            self.emit(AuthEvent::LoggedOut);
        }
    }

    async fn probe(&self, token: &str) -> std::result::Result<UserProfile, ApiError> {
        let request = PendingRequest::get("/auth/user")
            .ignore_auth_error()
            .timeout(self.settings.probe_timeout);
        let response = self.transport.dispatch(&request, Some(token)).await?;
        let user: UserProfile = decode_json(&response)?;

        let mut session = self.session.write().await;
        if session.access_token == token {
            session.user = Some(user.clone());
            if let Err(e) = self.store.save_user(&user).await {
                warn!(error = %e, "Failed to persist user profile");
            }
            self.publish(&session);
        }
        debug!(user_id = user.id, "Session probe succeeded");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use async_trait::async_trait;
    use bridge_desktop::MemorySecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::SecureStore;
    use mockall::mock;
    use serde_json::json;
    use url::Url;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn is_connected(&self) -> bool;
        }
    }

    fn manager_with(http: MockHttp, store: MemorySecureStore) -> SessionManager {
        let transport = ApiTransport::new(
            Arc::new(http),
            Url::parse("http://localhost:5000/api").unwrap(),
            Duration::from_secs(10),
        );
        SessionManager::new(
            transport,
            CredentialStore::new(Arc::new(store)),
            NotificationCenter::new(Default::default()),
            EventBus::default(),
            SessionSettings::default(),
        )
    }

    fn login_body() -> String {
        json!({
            "access_token": "T1",
            "refresh_token": "R1",
            "user": { "id": 1, "email": "a@b.com", "role": "admin" }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_login_persists_and_publishes() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                request.url.ends_with("/auth/login") && request.bearer().is_none()
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, login_body())));
        let store = MemorySecureStore::new();
        let manager = manager_with(http, store.clone());
        let mut snapshots = manager.subscribe();

        let session = manager
            .login(&Credentials::email("a@b.com", "secret"))
            .await
            .unwrap();

        assert_eq!(session.access_token, "T1");
        assert!(manager.is_authenticated());
        assert!(manager.is_admin());
        assert!(snapshots.has_changed().unwrap());
        assert!(snapshots.borrow_and_update().authenticated);
        assert_eq!(
            store.get_secret("quiz_master_refresh_token").await.unwrap(),
            Some(b"R1".to_vec())
        );
    }

    #[tokio::test]
    async fn test_login_missing_refresh_token_is_malformed() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"T1"}"#)));
        let store = MemorySecureStore::new();
        let manager = manager_with(http, store.clone());

        let result = manager.login(&Credentials::email("a@b.com", "x")).await;

        assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
        assert!(!manager.is_authenticated());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_rejection_carries_server_message() {
        let mut http = MockHttp::new();
        http.expect_execute().returning(|_| {
            Ok(HttpResponse::new(401, r#"{"error":"Invalid email or password"}"#))
        });
        let manager = manager_with(http, MemorySecureStore::new());

        let result = manager.login(&Credentials::email("a@b.com", "bad")).await;

        match result {
            Err(AuthError::InvalidCredentials(message)) => {
                assert_eq!(message, "Invalid email or password")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let shown = manager.notifications().list();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].category, NotificationCategory::Validation);
    }

    #[tokio::test]
    async fn test_register_notifies_success_and_keeps_session() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                let body: serde_json::Value =
                    serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
                request.url.ends_with("/auth/register") && body["username"] == "a@b.com"
            })
            .returning(|_| Ok(HttpResponse::new(201, r#"{"id":9,"email":"a@b.com"}"#)));
        let manager = manager_with(http, MemorySecureStore::new());

        let user = manager
            .register(&RegisterRequest {
                email: "a@b.com".to_string(),
                password: "secret".to_string(),
                ..RegisterRequest::default()
            })
            .await
            .unwrap();

        assert_eq!(user.id, Some(9));
        assert!(!manager.is_authenticated());
        let shown = manager.notifications().list();
        assert_eq!(shown[0].message, REGISTERED_MESSAGE);
        assert_eq!(shown[0].severity, Severity::Success);
    }

    #[tokio::test]
    async fn test_register_conflict_uses_server_error() {
        let mut http = MockHttp::new();
        http.expect_execute().returning(|_| {
            Ok(HttpResponse::new(409, r#"{"error":"Email already registered"}"#))
        });
        let manager = manager_with(http, MemorySecureStore::new());

        let result = manager.register(&RegisterRequest::default()).await;

        assert!(matches!(result, Err(AuthError::Api(ref e)) if e.status() == Some(409)));
        assert_eq!(
            manager.notifications().list()[0].message,
            "Email already registered"
        );
    }

    #[tokio::test]
    async fn test_logout_is_unconditional() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(200, login_body())));
        let store = MemorySecureStore::new();
        let manager = manager_with(http, store.clone());
        manager
            .login(&Credentials::email("a@b.com", "secret"))
            .await
            .unwrap();
        manager.notifications().add("stale", Severity::Info);

        manager.logout().await;

        assert!(!manager.is_authenticated());
        assert!(manager.current_user().is_none());
        assert!(store.is_empty().await);
        let shown = manager.notifications().list();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, LOGGED_OUT_MESSAGE);
        assert_eq!(shown[0].category, NotificationCategory::Logout);
    }

    #[tokio::test]
    async fn test_check_auth_without_token() {
        let manager = manager_with(MockHttp::new(), MemorySecureStore::new());
        assert!(manager.check_auth().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_check_auth_stores_profile() {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                request.url.ends_with("/auth/user")
                    && request.bearer() == Some("T1")
                    && request.timeout == Some(Duration::from_secs(5))
            })
            .returning(|_| Ok(HttpResponse::new(200, r#"{"id":3,"role":"admin"}"#)));
        let manager = manager_with(http, store.clone());
        manager.restore().await;

        let user = manager.check_auth().await.unwrap().unwrap();

        assert_eq!(user.role, Role::Admin);
        assert!(manager.is_admin());
        assert!(store.has_secret("quiz_master_user").await.unwrap());
    }

    #[tokio::test]
    async fn test_check_auth_rejection_signs_out() {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(403, r#"{"error":"Forbidden"}"#)));
        let manager = manager_with(http, store.clone());
        manager.restore().await;

        let result = manager.check_auth().await;

        assert!(matches!(result, Err(AuthError::SessionExpired)));
        assert!(!manager.is_authenticated());
        assert!(store.is_empty().await);
        assert!(manager.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_check_auth_network_error_keeps_session() {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        let mut http = MockHttp::new();
        http.expect_execute().returning(|_| {
            Err(bridge_traits::BridgeError::OperationFailed(
                "connection refused".to_string(),
            ))
        });
        let manager = manager_with(http, store);
        manager.restore().await;

        let result = manager.check_auth().await;

        assert!(matches!(result, Err(ref e) if e.is_network()));
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_validate_session_silent_and_loud() {
        let store = MemorySecureStore::new();
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(401, r#"{"error":"expired"}"#)));
        let manager = manager_with(http, store.clone());

        assert!(!manager.validate_session(false).await);

        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        manager.restore().await;
        assert!(!manager.validate_session(true).await);
        assert!(manager.notifications().is_empty());

        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        manager.restore().await;
        assert!(!manager.validate_session(false).await);
        assert_eq!(
            manager.notifications().list()[0].message,
            SESSION_EXPIRED_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_validate_session_tolerates_server_errors() {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(502, "")));
        let manager = manager_with(http, store);
        manager.restore().await;

        assert!(manager.validate_session(false).await);
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_expires_session() {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        let manager = manager_with(MockHttp::new(), store);
        manager.restore().await;

        let result = manager.refresh().await;

        assert!(matches!(result, Err(RefreshFailure::MissingRefreshToken)));
        assert!(!manager.is_authenticated());
        assert!(manager.is_logging_out());
        assert_eq!(manager.refresh_state(), RefreshState::Idle);
        assert_eq!(
            manager.notifications().list()[0].category,
            NotificationCategory::SessionExpired
        );
    }
}

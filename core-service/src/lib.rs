//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into the running client
//! core: one event bus, one notification queue, the session manager, the
//! authenticated API client, the domain actions and the navigation guard.
//! Desktop apps enable the `desktop-shims` feature so the configuration
//! falls back to reqwest and the OS keychain; other hosts inject their own
//! capabilities through the [`CoreConfig`] builder.
//!
//! ```ignore
//! use core_service::{CoreConfig, QuizMasterCore};
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://quiz.example.com/api")
//!     .build()?;
//! let core = QuizMasterCore::bootstrap(config).await?;
//!
//! let transition = core.guard().before_each("/dashboard");
//! ```

pub mod error;
pub mod router;

pub use error::{CoreError, Result};
pub use router::{GuardDecision, NavigationGuard, ResolvedRoute, Route, Transition};

pub use core_auth::{
    ApiClient, AuthSnapshot, Credentials, RegisterRequest, Role, Session, SessionManager,
    UserProfile,
};
pub use core_quiz::{QuizActions, ViewState};
pub use core_runtime::{CoreConfig, CoreEvent, EventBus, NotificationCenter};

use core_auth::{ApiTransport, CredentialStore, SessionSettings};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Dropping the core stops the navigation listener.
pub struct QuizMasterCore {
    config: CoreConfig,
    event_bus: EventBus,
    notifications: NotificationCenter,
    session: SessionManager,
    actions: QuizActions,
    guard: NavigationGuard,
    listener: JoinHandle<()>,
}

impl QuizMasterCore {
    /// Builds every component from `config` and restores the persisted
    /// session. Must run inside a tokio runtime.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        if Handle::try_current().is_err() {
            return Err(CoreError::InitializationFailed(
                "QuizMasterCore must be bootstrapped inside a tokio runtime".to_string(),
            ));
        }
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let notifications = NotificationCenter::with_parts(
            config.notifications,
            config.clock.clone(),
            Some(event_bus.clone()),
        );

        let transport = ApiTransport::new(
            config.http_client.clone(),
            config.api_base_url.clone(),
            config.timeouts.request,
        );
        let session = SessionManager::new(
            transport,
            CredentialStore::new(config.secure_store.clone()),
            notifications.clone(),
            event_bus.clone(),
            SessionSettings::from(&config),
        );
        session.restore().await;

        let actions = QuizActions::new(ApiClient::new(session.clone()), notifications.clone());
        let guard = NavigationGuard::new(session.clone());
        let listener = guard.listen(&event_bus);

        info!(
            api_base_url = %config.api_base_url,
            authenticated = session.is_authenticated(),
            "Quiz Master core ready"
        );

        Ok(Self {
            config,
            event_bus,
            notifications,
            session,
            actions,
            guard,
            listener,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn actions(&self) -> &QuizActions {
        &self.actions
    }

    /// Shorthand for `actions().state()`.
    pub fn view_state(&self) -> &ViewState {
        self.actions.state()
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }
}

impl Drop for QuizMasterCore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

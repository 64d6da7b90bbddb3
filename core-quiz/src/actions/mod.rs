//! # Domain Actions
//!
//! One method per backend endpoint, grouped by resource in the submodules.
//! Every action goes through the authenticated [`ApiClient`], toggles the
//! shared loading flag around the call and, on failure, turns the response
//! into a single user-facing message:
//!
//! 1. A resource-specific text for 409 conflicts, when the action has one.
//! 2. The server's `message` for 400 responses, when the action opts in.
//! 3. The server's `error` field, then its `message` field.
//! 4. The action's default text ("Failed to fetch subjects", ...).
//!
//! Reads only record the message as the view error. Mutations also show it
//! once through the [`NotificationCenter`], unless the failure is a 401
//! whose refresh already failed: the session manager has told the user
//! about that one. A 401 on the replay after a good refresh is notified
//! like any other failure.

mod admin;
mod chapters;
mod questions;
mod quizzes;
mod scores;
mod subjects;

pub use scores::ExportPolling;

use crate::error::{ActionError, Result};
use crate::state::ViewState;
use core_auth::{ApiClient, ApiError, PendingRequest};
use core_runtime::notifications::{NotificationCenter, Severity};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// How an action phrases its failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Failure {
    default: &'static str,
    conflict: Option<&'static str>,
    bad_request_message: bool,
}

impl Failure {
    pub(crate) const fn new(default: &'static str) -> Self {
        Self {
            default,
            conflict: None,
            bad_request_message: false,
        }
    }

    pub(crate) const fn on_conflict(mut self, text: &'static str) -> Self {
        self.conflict = Some(text);
        self
    }

    pub(crate) const fn bad_request_uses_message(mut self) -> Self {
        self.bad_request_message = true;
        self
    }

    pub(crate) fn message_for(&self, error: &ApiError) -> String {
        match (error.status(), self.conflict) {
            (Some(409), Some(text)) => return text.to_string(),
            (Some(400), _) if self.bad_request_message => {
                if let Some(text) = error.body_field("message") {
                    return text.to_string();
                }
            }
            _ => {}
        }

        error
            .body_field("error")
            .or_else(|| error.body_field("message"))
            .unwrap_or(self.default)
            .to_string()
    }
}

/// Entry point for every domain action.
#[derive(Clone)]
pub struct QuizActions {
    client: ApiClient,
    notifications: NotificationCenter,
    state: ViewState,
    polling: ExportPolling,
}

impl QuizActions {
    pub fn new(client: ApiClient, notifications: NotificationCenter) -> Self {
        Self {
            client,
            notifications,
            state: ViewState::new(),
            polling: ExportPolling::default(),
        }
    }

    pub fn with_export_polling(mut self, polling: ExportPolling) -> Self {
        self.polling = polling;
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Runs a read: failures set the view error only.
    pub(crate) async fn read<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
        failure: Failure,
    ) -> Result<T> {
        self.run(request, failure, false).await
    }

    /// Runs a mutation: failures set the view error and notify once.
    pub(crate) async fn mutate<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
        failure: Failure,
    ) -> Result<T> {
        self.run(request, failure, true).await
    }

    pub(crate) fn succeed(&self, message: &str) {
        self.notifications.add(message, Severity::Success);
    }

    /// Mutation body serialization failures are reported like any other
    /// failed mutation.
    pub(crate) fn body<T: serde::Serialize + ?Sized>(
        &self,
        request: PendingRequest,
        body: &T,
        failure: Failure,
    ) -> Result<PendingRequest> {
        request.json(body).map_err(|e| self.fail(e, failure, true))
    }

    async fn run<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
        failure: Failure,
        notify: bool,
    ) -> Result<T> {
        let _loading = self.state.begin_loading();
        let method = request.method;
        let path = request.path.clone();

        match self.client.send_json::<T>(request).await {
            Ok(value) => {
                debug!(%method, path = %path, "Action succeeded");
                Ok(value)
            }
            Err(e) => {
                warn!(%method, path = %path, status = e.status(), error = %e, "Action failed");
                Err(self.fail(e, failure, notify))
            }
        }
    }

    fn fail(&self, cause: ApiError, failure: Failure, notify: bool) -> ActionError {
        let message = failure.message_for(&cause);
        self.state.set_error(&message);
        if notify && !cause.is_reported() {
            self.notifications.add(message.clone(), Severity::Error);
        }
        ActionError::new(message, cause)
    }
}

/// Success text from a `{ "message": ... }` response, or `fallback`.
pub(crate) fn server_message(body: &Value, fallback: &str) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::MemorySecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::SecureStore;
    use core_auth::{ApiTransport, CredentialStore, SessionManager, SessionSettings};
    use core_runtime::events::EventBus;
    use mockall::mock;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn is_connected(&self) -> bool;
        }
    }

    pub fn respond(status: u16, body: serde_json::Value) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(status, body.to_string()))
    }

    pub fn body_of(request: &HttpRequest) -> serde_json::Value {
        request
            .body
            .as_ref()
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
            .unwrap_or(serde_json::Value::Null)
    }

    /// Actions over `http`, signed in with access token `T1` and refresh
    /// token `R1`.
    pub async fn actions_with(http: MockHttp) -> QuizActions {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        store
            .set_secret("quiz_master_refresh_token", b"R1")
            .await
            .unwrap();

        let notifications = NotificationCenter::new(Default::default());
        let transport = ApiTransport::new(
            Arc::new(http),
            Url::parse("http://localhost:5000/api").unwrap(),
            Duration::from_secs(10),
        );
        let session = SessionManager::new(
            transport,
            CredentialStore::new(Arc::new(store)),
            notifications.clone(),
            EventBus::default(),
            SessionSettings::default(),
        );
        session.restore().await;

        QuizActions::new(ApiClient::new(session), notifications).with_export_polling(
            ExportPolling {
                interval: Duration::from_millis(500),
                deadline: Duration::from_secs(5),
            },
        )
    }

    pub fn notifications(actions: &QuizActions) -> Vec<(Severity, String)> {
        actions
            .notifications
            .list()
            .into_iter()
            .map(|n| (n.severity, n.message))
            .collect()
    }
}

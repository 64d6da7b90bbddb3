//! Authenticated API client.
//!
//! Wraps [`ApiTransport`] with two interceptor stages:
//!
//! 1. **Request**: attach `Authorization: Bearer <access token>` from the
//!    session unless the request is anonymous.
//! 2. **Response error**: a 401 on a request that has not been retried and
//!    does not opt out with `ignore_auth_error` triggers one refresh through
//!    the [`SessionManager`] and one replay with the new token. If the
//!    refresh fails the original 401 comes back as
//!    [`ApiError::RefreshFailed`] when the session manager has already
//!    notified the user. A 401 on the replay is returned as is.

use crate::error::ApiError;
use crate::manager::SessionManager;
use crate::transport::{decode_json, ApiTransport, PendingRequest};
use bridge_traits::http::HttpResponse;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct ApiClient {
    transport: ApiTransport,
    session: SessionManager,
}

impl ApiClient {
    pub fn new(session: SessionManager) -> Self {
        Self {
            transport: session.transport().clone(),
            session,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Sends `request`, refreshing and replaying once on an eligible 401.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, mut request: PendingRequest) -> Result<HttpResponse, ApiError> {
        let sent_with = self.bearer_for(&request).await;
        let original = match self.transport.dispatch(&request, sent_with.as_deref()).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if !original.is_unauthorized()
            || request.retried
            || request.ignore_auth_error
            || request.anonymous
        {
            return Err(original);
        }
        if self.session.is_logging_out() {
            debug!("Session is ending; returning 401 without refresh");
            return Err(ApiError::RefreshFailed(Box::new(original)));
        }

        request.retried = true;

        let current = self.session.access_token().await;
        let token = if !current.is_empty() && Some(current.as_str()) != sent_with.as_deref() {
            debug!("Token changed while request was in flight; replaying without refresh");
            current
        } else {
            info!("Unauthorized response; refreshing access token");
            match self.session.refresh().await {
                Ok(token) => token,
                Err(failure) if failure.is_reported() => {
                    warn!(error = %failure, "Refresh failed; returning original 401");
                    return Err(ApiError::RefreshFailed(Box::new(original)));
                }
                Err(failure) => {
                    debug!(error = %failure, "Refresh abandoned; returning original 401");
                    return Err(original);
                }
            }
        };

        self.transport.dispatch(&request, Some(&token)).await
    }

    /// [`send`](Self::send) and decode the JSON body. An empty body decodes
    /// as `null`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        decode_json(&response)
    }

    async fn bearer_for(&self, request: &PendingRequest) -> Option<String> {
        if request.anonymous {
            return None;
        }
        Some(self.session.access_token().await).filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential_store::CredentialStore;
    use crate::manager::SessionSettings;
    use async_trait::async_trait;
    use bridge_desktop::MemorySecureStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest};
    use bridge_traits::SecureStore;
    use core_runtime::events::EventBus;
    use core_runtime::notifications::NotificationCenter;
    use mockall::{mock, Sequence};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn is_connected(&self) -> bool;
        }
    }

    async fn client_with(http: MockHttp) -> ApiClient {
        let store = MemorySecureStore::new();
        store.set_secret("quiz_master_token", b"T1").await.unwrap();
        store
            .set_secret("quiz_master_refresh_token", b"R1")
            .await
            .unwrap();

        let transport = ApiTransport::new(
            Arc::new(http),
            Url::parse("http://localhost:5000/api").unwrap(),
            Duration::from_secs(10),
        );
        let session = SessionManager::new(
            transport,
            CredentialStore::new(Arc::new(store)),
            NotificationCenter::new(Default::default()),
            EventBus::default(),
            SessionSettings::default(),
        );
        session.restore().await;
        ApiClient::new(session)
    }

    #[tokio::test]
    async fn test_request_stage_attaches_bearer() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.bearer() == Some("T1"))
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "[]")));
        let client = client_with(http).await;

        let subjects: Vec<serde_json::Value> =
            client.send_json(PendingRequest::get("/subjects")).await.unwrap();
        assert!(subjects.is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_bearer() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.bearer().is_none())
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "{}")));
        let client = client_with(http).await;

        let err = client
            .send(PendingRequest::get("/public").anonymous())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_401_refreshes_and_replays_once() {
        let mut seq = Sequence::new();
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| request.url.ends_with("/subjects") && request.bearer() == Some("T1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(401, r#"{"error":"Token expired"}"#)));
        http.expect_execute()
            .withf(|request| request.url.ends_with("/auth/refresh") && request.bearer() == Some("R1"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"T2"}"#)));
        http.expect_execute()
            .withf(|request| request.url.ends_with("/subjects") && request.bearer() == Some("T2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"[{"id":1}]"#)));
        let client = client_with(http).await;

        let subjects: Vec<serde_json::Value> =
            client.send_json(PendingRequest::get("/subjects")).await.unwrap();

        assert_eq!(subjects.len(), 1);
        assert_eq!(client.session().access_token().await, "T2");
    }

    #[tokio::test]
    async fn test_second_401_is_final() {
        let mut seq = Sequence::new();
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(401, "{}")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"T2"}"#)));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(401, r#"{"error":"still no"}"#)));
        let client = client_with(http).await;

        let err = client.send(PendingRequest::get("/scores")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(!err.is_reported());
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_ignore_auth_error_skips_refresh() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "{}")));
        let client = client_with(http).await;

        let err = client
            .send(PendingRequest::get("/auth/user").ignore_auth_error())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_other_statuses_pass_through() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(409, r#"{"error":"duplicate"}"#)));
        let client = client_with(http).await;

        let err = client.send(PendingRequest::post("/subjects")).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.body_field("error"), Some("duplicate"));
    }

    #[tokio::test]
    async fn test_server_failure_on_refresh_returns_original_401() {
        let mut seq = Sequence::new();
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(401, r#"{"error":"Token expired"}"#)));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(500, "{}")));
        let client = client_with(http).await;

        let err = client.send(PendingRequest::get("/subjects")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(err.is_reported());
        assert_eq!(err.to_string(), "HTTP 401: Token expired");
        assert!(client.session().is_authenticated());
    }
}

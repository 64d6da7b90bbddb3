//! Request Dispatch
//!
//! [`PendingRequest`] describes one backend call relative to the API base URL;
//! [`ApiTransport`] turns it into an [`HttpRequest`], sends it once through
//! the host [`HttpClient`] and classifies the outcome. Authentication and
//! retries live one layer up in [`ApiClient`](crate::ApiClient).

use crate::error::ApiError;
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// A backend call, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: HttpMethod,
    /// Path below the base URL, e.g. `/subjects/3`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the transport's default deadline.
    pub timeout: Option<Duration>,
    /// Set once the request has been replayed after a refresh.
    pub(crate) retried: bool,
    /// A 401 on this request is returned as-is instead of triggering a refresh.
    pub ignore_auth_error: bool,
    /// Send without a bearer credential.
    pub anonymous: bool,
}

impl PendingRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            retried: false,
            ignore_auth_error: false,
            anonymous: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn ignore_auth_error(mut self) -> Self {
        self.ignore_auth_error = true;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// Single-shot dispatcher bound to one API base URL.
#[derive(Clone)]
pub struct ApiTransport {
    http: Arc<dyn HttpClient>,
    base_url: Url,
    default_timeout: Duration,
}

impl ApiTransport {
    pub fn new(http: Arc<dyn HttpClient>, base_url: Url, default_timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            default_timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `request`, query string included.
    pub fn url_for(&self, request: &PendingRequest) -> Result<Url, ApiError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| ApiError::Serialization(format!("invalid request path: {}", e)))?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                request
                    .query
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
        }
        Ok(url)
    }

    /// Sends `request` once with `bearer` attached when given.
    ///
    /// Any non-2xx status becomes [`ApiError::Status`].
    pub async fn dispatch(
        &self,
        request: &PendingRequest,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let url = self.url_for(request)?;
        let deadline = request.timeout.unwrap_or(self.default_timeout);

        let mut http_request = HttpRequest::new(request.method, url.as_str())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .timeout(deadline);
        if let Some(token) = bearer.filter(|token| !token.is_empty()) {
            http_request = http_request.bearer_token(token);
        }
        if let Some(body) = &request.body {
            http_request = http_request
                .json(body)
                .map_err(|e| ApiError::Serialization(e.to_string()))?;
        }

        debug!(method = %request.method, path = %request.path, retried = request.retried, "Dispatching request");

        let response = match tokio::time::timeout(deadline, self.http.execute(http_request)).await
        {
            Err(_) => {
                warn!(method = %request.method, path = %request.path, ?deadline, "Request timed out");
                return Err(ApiError::Timeout(deadline));
            }
            Ok(Err(BridgeError::Timeout(ms))) => {
                warn!(method = %request.method, path = %request.path, ms, "Request timed out");
                return Err(ApiError::Timeout(Duration::from_millis(ms)));
            }
            Ok(Err(e)) => {
                warn!(method = %request.method, path = %request.path, error = %e, "Request failed");
                return Err(ApiError::Network(e.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        if response.is_success() {
            return Ok(response);
        }

        let body: Value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);
        let message = ["error", "message"]
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str))
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| reason_phrase(response.status));

        debug!(method = %request.method, path = %request.path, status = response.status, "Request rejected");
        Err(ApiError::Status {
            status: response.status,
            message,
            body,
        })
    }
}

/// Decodes a 2xx body. An empty body decodes as JSON `null`.
pub fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Null)
            .map_err(|e| ApiError::Serialization(e.to_string()));
    }
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn reason_phrase(status: u16) -> String {
    let phrase = match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return format!("Request failed with status code {}", status),
    };
    phrase.to_string()
}

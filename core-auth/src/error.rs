use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Outcome of a request that did not produce a usable 2xx response.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        /// Server-provided `error`/`message` text, or the reason phrase.
        message: String,
        /// Parsed JSON body, `Value::Null` when the body was not JSON.
        body: Value,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request or response payload: {0}")]
    Serialization(String),

    /// A 401 the session manager could not recover from. It has already
    /// told the user (session expired or server problem).
    #[error(transparent)]
    RefreshFailed(Box<ApiError>),
}

impl ApiError {
    /// HTTP status when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RefreshFailed(original) => original.status(),
            _ => None,
        }
    }

    /// True when the failure was already surfaced by the session manager.
    pub fn is_reported(&self) -> bool {
        matches!(self, ApiError::RefreshFailed(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// 401 or 403: the backend rejected our credentials.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// String field from the error body, if present and non-empty.
    pub fn body_field(&self, field: &str) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => body
                .get(field)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty()),
            ApiError::RefreshFailed(original) => original.body_field(field),
            _ => None,
        }
    }
}

/// Why a token refresh did not produce a new access token.
///
/// Cloneable because every caller waiting on the same in-flight refresh
/// receives its own copy of the outcome.
#[derive(Error, Debug, Clone)]
pub enum RefreshFailure {
    #[error("No refresh token is stored")]
    MissingRefreshToken,

    #[error("Refresh token rejected with status {0}")]
    Rejected(u16),

    #[error("Refresh response did not include an access token")]
    MalformedResponse,

    #[error("Refresh request failed: {0}")]
    Transport(ApiError),

    #[error("Session ended while the refresh was in flight")]
    SessionEnded,

    #[error("Refresh task was aborted")]
    Aborted,
}

impl RefreshFailure {
    /// Terminal failures end the session; the rest leave it in place.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefreshFailure::MissingRefreshToken | RefreshFailure::Rejected(_)
        )
    }

    /// Whether the session manager notified the user about this failure.
    pub fn is_reported(&self) -> bool {
        !matches!(self, RefreshFailure::SessionEnded | RefreshFailure::Aborted)
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Malformed response from server: {0}")]
    MalformedResponse(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    #[error("Secure storage unavailable: {0}")]
    Storage(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// True for connectivity problems, as opposed to rejections.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            AuthError::Api(ApiError::Network(_) | ApiError::Timeout(_))
                | AuthError::RefreshFailed(RefreshFailure::Transport(
                    ApiError::Network(_) | ApiError::Timeout(_)
                ))
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

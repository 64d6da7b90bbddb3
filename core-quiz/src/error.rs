use core_auth::ApiError;
use thiserror::Error;

/// A failed domain action.
///
/// `message` is the user-facing text that was stored as the view error (and
/// notified, for mutations); `cause` keeps the transport outcome for callers
/// that branch on status codes.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ActionError {
    pub message: String,
    #[source]
    pub cause: ApiError,
}

impl ActionError {
    pub fn new(message: impl Into<String>, cause: ApiError) -> Self {
        Self {
            message: message.into(),
            cause,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;

//! Core Authentication Types
//!
//! Wire and in-memory types for the quiz backend's session protocol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Account role as reported by the backend.
///
/// Unknown role names deserialize to [`Role::User`] so an unexpected value
/// never grants admin routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in user's profile.
///
/// Fields the client does not interpret are kept in `extra` so the cached
/// copy round-trips without loss.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Best human-readable name available.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self
                .username
                .clone()
                .or_else(|| self.email.clone())
                .unwrap_or_else(|| "User".to_string()),
        }
    }
}

/// Login credentials. The backend accepts either an email or a username.
#[derive(Clone, Serialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

impl Credentials {
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            username: None,
            password: password.into(),
        }
    }

    pub fn username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: None,
            username: Some(username.into()),
            password: password.into(),
        }
    }

    /// Login name for log lines.
    pub fn identifier(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Sign-up form as entered by the user.
#[derive(Clone, Default)]
pub struct RegisterRequest {
    /// Defaults to the email address when absent.
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Body sent to `POST /auth/register`. Optional fields are sent as `null`.
#[derive(Debug, Serialize)]
pub(crate) struct RegisterPayload<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub qualification: Option<&'a str>,
    pub dob: Option<NaiveDate>,
}

impl RegisterRequest {
    pub(crate) fn payload(&self) -> RegisterPayload<'_> {
        let username = self
            .username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email);
        RegisterPayload {
            username,
            email: &self.email,
            password: &self.password,
            first_name: &self.first_name,
            last_name: &self.last_name,
            qualification: self.qualification.as_deref().filter(|q| !q.is_empty()),
            dob: self.dob,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// The in-memory session.
///
/// An empty `access_token` means signed out.
#[derive(Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        !self.access_token.is_empty()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(UserProfile::is_admin)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .field("user", &self.user.as_ref().and_then(|u| u.id))
            .finish()
    }
}

/// Derived, token-free view of the session for guards and views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub admin: bool,
    pub user: Option<UserProfile>,
}

impl From<&Session> for AuthSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            authenticated: session.is_authenticated(),
            admin: session.is_admin(),
            user: session.user.clone(),
        }
    }
}

/// Whether a token refresh is currently outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "Idle"),
            RefreshState::Refreshing => write!(f, "Refreshing..."),
        }
    }
}

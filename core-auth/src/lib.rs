//! # Authentication Module
//!
//! Session ownership and authenticated transport for the quiz client.
//!
//! ## Overview
//!
//! - [`CredentialStore`] persists the access token, refresh token and user
//!   profile through the host's secure store.
//! - [`SessionManager`] owns the session: login, registration, logout,
//!   session probes and the single-flight token refresh.
//! - [`ApiClient`] dispatches backend calls, attaching the bearer token and
//!   recovering from an expired access token with one refresh-and-replay.
//!
//! ## Features
//!
//! - Concurrent 401s share one refresh call
//! - Write-through persistence of every session change
//! - Forced logout with a login redirect when the backend rejects the refresh token
//! - Auth state published on the event bus and through a `watch` snapshot

pub mod client;
pub mod credential_store;
pub mod error;
pub mod manager;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use credential_store::CredentialStore;
pub use error::{ApiError, AuthError, RefreshFailure, Result};
pub use manager::{SessionManager, SessionSettings};
pub use transport::{decode_json, ApiTransport, PendingRequest};
pub use types::{
    AuthSnapshot, Credentials, RefreshState, RegisterRequest, Role, Session, UserProfile,
};

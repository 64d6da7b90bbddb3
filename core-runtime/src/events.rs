//! # Event Bus System
//!
//! Decoupled communication between the session manager, the notification
//! center and whatever plays the role of router in the host, built on
//! `tokio::sync::broadcast`.
//!
//! ```text
//! ┌─────────────────┐  emit   ┌───────────┐  subscribe  ┌──────────────────┐
//! │ SessionManager  ├────────>│           ├────────────>│ NavigationGuard  │
//! └─────────────────┘         │ EventBus  │             └──────────────────┘
//! ┌─────────────────┐  emit   │ (broadcast│  subscribe  ┌──────────────────┐
//! │ Notifications   ├────────>│  channel) ├────────────>│ Host view layer  │
//! └─────────────────┘         └───────────┘             └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshing)).ok();
//! assert!(matches!(stream.try_recv(), Ok(CoreEvent::Auth(AuthEvent::TokenRefreshing))));
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep receiving.
//! - **`RecvError::Closed`**: every sender is gone, treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; producers ignore it with
//! `let _ = bus.emit(..)` since nobody listening is a normal state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::broadcast;

use crate::notifications::Severity;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Auth(AuthEvent),
    /// Notification queue changes
    Notification(NotificationEvent),
    /// Navigation requests raised outside the router
    Navigation(NavigationEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Notification(e) => e.description(),
            CoreEvent::Navigation(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::SessionExpired) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::RefreshFailed { terminal: true, .. }) => {
                EventSeverity::Error
            }
            CoreEvent::Auth(AuthEvent::RefreshFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::LoggedIn { .. }) => EventSeverity::Info,
            CoreEvent::Auth(AuthEvent::LoggedOut) => EventSeverity::Info,
            CoreEvent::Navigation(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Session lifecycle events published by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Credentials accepted and tokens stored.
    LoggedIn {
        user_id: Option<i64>,
        role: String,
    },
    /// Account created; the caller still has to log in.
    Registered { username: String },
    /// Session cleared, either on request or because it expired.
    LoggedOut,
    /// A refresh call was issued to the backend.
    TokenRefreshing,
    /// A refresh call succeeded.
    TokenRefreshed {
        /// Whether the backend also rotated the refresh token.
        rotated: bool,
    },
    /// A refresh call failed.
    RefreshFailed {
        message: String,
        /// Terminal failures end the session.
        terminal: bool,
    },
    /// The backend rejected our credentials; a login is required.
    SessionExpired,
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::LoggedIn { .. } => "User logged in",
            AuthEvent::Registered { .. } => "User registered",
            AuthEvent::LoggedOut => "User logged out",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::RefreshFailed { .. } => "Token refresh failed",
            AuthEvent::SessionExpired => "Session expired",
        }
    }
}

// ============================================================================
// Notification Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NotificationEvent {
    Added {
        id: String,
        severity: Severity,
        message: String,
    },
    /// Removed by expiry, eviction or dismissal.
    Removed { id: String },
    Cleared,
}

impl NotificationEvent {
    fn description(&self) -> &str {
        match self {
            NotificationEvent::Added { .. } => "Notification shown",
            NotificationEvent::Removed { .. } => "Notification removed",
            NotificationEvent::Cleared => "Notifications cleared",
        }
    }
}

// ============================================================================
// Navigation Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NavigationEvent {
    /// Ask the router to move to a named route.
    RedirectRequested {
        route: String,
        query: BTreeMap<String, String>,
    },
}

impl NavigationEvent {
    fn description(&self) -> &str {
        match self {
            NavigationEvent::RedirectRequested { .. } => "Redirect requested",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event, returning the number of subscribers reached.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that skips events rejected by a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let stream = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Navigation(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

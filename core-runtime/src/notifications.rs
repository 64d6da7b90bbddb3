//! # Notification Center
//!
//! A small, bounded queue of user-facing messages ("toasts").
//!
//! - An identical message with the same severity is rejected while an earlier
//!   copy is still queued and younger than the dedup window.
//! - Session-class messages ([`NotificationCategory::SessionExpired`] and
//!   [`NotificationCategory::Logout`]) are deduplicated against each other
//!   regardless of wording, so two racing failure paths announce the end of
//!   a session once.
//! - At capacity the oldest entry is evicted before the new one is inserted.
//! - Every entry removes itself after the display duration. The timer is a
//!   tokio task; its handle is aborted when the entry leaves the queue early.
//!
//! Ages are measured with `tokio::time::Instant`, so tests running on a
//! paused runtime control expiry and dedup deterministically.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{CoreEvent, EventBus, NotificationEvent};

pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(4);
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(10);
pub const DEFAULT_CAPACITY: usize = 2;

/// Visual severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// What a notification is about, set by whoever produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationCategory {
    Generic,
    Validation,
    SessionExpired,
    Logout,
    ServerProblem,
}

impl NotificationCategory {
    /// Categories announcing that the session ended.
    pub fn is_session_end(&self) -> bool {
        matches!(
            self,
            NotificationCategory::SessionExpired | NotificationCategory::Logout
        )
    }
}

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub severity: Severity,
    pub category: NotificationCategory,
    pub created_at: DateTime<Utc>,
}

/// Queue tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSettings {
    pub display_duration: Duration,
    pub dedup_window: Duration,
    pub capacity: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            display_duration: DEFAULT_DISPLAY_DURATION,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

struct Entry {
    notification: Notification,
    inserted_at: Instant,
    expiry: Option<AbortHandle>,
}

impl Entry {
    fn cancel_expiry(&self) {
        if let Some(handle) = &self.expiry {
            handle.abort();
        }
    }
}

struct Inner {
    entries: Mutex<VecDeque<Entry>>,
    settings: NotificationSettings,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    snapshot: watch::Sender<Vec<Notification>>,
}

/// Deduplicating, capacity-bounded, self-expiring notification queue.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    pub fn new(settings: NotificationSettings) -> Self {
        Self::with_parts(settings, Arc::new(SystemClock), None)
    }

    /// Builds a center that stamps entries with `clock` and mirrors queue
    /// changes onto `event_bus`.
    pub fn with_parts(
        settings: NotificationSettings,
        clock: Arc<dyn Clock>,
        event_bus: Option<EventBus>,
    ) -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(VecDeque::new()),
                settings,
                clock,
                event_bus,
                snapshot,
            }),
        }
    }

    pub fn settings(&self) -> NotificationSettings {
        self.inner.settings
    }

    /// Shorthand for [`add_with_category`](Self::add_with_category) with
    /// [`NotificationCategory::Generic`].
    pub fn add(&self, message: impl Into<String>, severity: Severity) -> Option<String> {
        self.add_with_category(message, severity, NotificationCategory::Generic)
    }

    /// Queues a notification.
    ///
    /// Returns the new id, or `None` when the message was suppressed as a
    /// duplicate.
    pub fn add_with_category(
        &self,
        message: impl Into<String>,
        severity: Severity,
        category: NotificationCategory,
    ) -> Option<String> {
        let message = message.into();
        let settings = self.inner.settings;
        let now = Instant::now();

        let (notification, evicted) = {
            let mut entries = self.inner.lock();

            let duplicate = entries.iter().any(|entry| {
                if now.duration_since(entry.inserted_at) >= settings.dedup_window {
                    return false;
                }
                let same = entry.notification.message == message
                    && entry.notification.severity == severity;
                let same_session_end =
                    category.is_session_end() && entry.notification.category.is_session_end();
                same || same_session_end
            });
            if duplicate {
                debug!(%severity, ?category, message = %message, "Duplicate notification suppressed");
                return None;
            }

            let mut evicted = Vec::new();
            while settings.capacity > 0 && entries.len() >= settings.capacity {
                if let Some(oldest) = entries.pop_front() {
                    oldest.cancel_expiry();
                    evicted.push(oldest.notification.id);
                }
            }

            let notification = Notification {
                id: self.next_id(),
                message,
                severity,
                category,
                created_at: self.inner.clock.now(),
            };
            let expiry = self.schedule_expiry(&notification.id);
            entries.push_back(Entry {
                notification: notification.clone(),
                inserted_at: now,
                expiry,
            });
            (notification, evicted)
        };

        for id in evicted {
            debug!(id = %id, "Evicted oldest notification");
            self.emit(NotificationEvent::Removed { id });
        }
        debug!(id = %notification.id, severity = %notification.severity, "Notification added");
        self.emit(NotificationEvent::Added {
            id: notification.id.clone(),
            severity: notification.severity,
            message: notification.message.clone(),
        });
        self.inner.publish();

        Some(notification.id)
    }

    /// Dismisses a notification. Returns `false` if it was already gone.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.inner.take(id);
        if let Some(entry) = &removed {
            entry.cancel_expiry();
            self.emit(NotificationEvent::Removed { id: id.to_string() });
            self.inner.publish();
        }
        removed.is_some()
    }

    /// Drops every queued notification.
    pub fn clear(&self) {
        let drained: Vec<Entry> = self.inner.lock().drain(..).collect();
        for entry in &drained {
            entry.cancel_expiry();
        }
        self.emit(NotificationEvent::Cleared);
        self.inner.publish();
    }

    /// Current queue, oldest first.
    pub fn list(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Reactive view of the queue, updated after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.inner.snapshot.subscribe()
    }

    fn next_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}",
            self.inner.clock.unix_timestamp_millis(),
            &suffix[..9]
        )
    }

    fn schedule_expiry(&self, id: &str) -> Option<AbortHandle> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(id = %id, "No tokio runtime; notification will not expire on its own");
                return None;
            }
        };

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = id.to_string();
        let delay = self.inner.settings.display_duration;

        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if inner.take(&id).is_some() {
                debug!(id = %id, "Notification expired");
                if let Some(bus) = &inner.event_bus {
                    let _ = bus.emit(CoreEvent::Notification(NotificationEvent::Removed { id }));
                }
                inner.publish();
            }
        });
        Some(task.abort_handle())
    }

    fn emit(&self, event: NotificationEvent) {
        if let Some(bus) = &self.inner.event_bus {
            let _ = bus.emit(CoreEvent::Notification(event));
        }
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(NotificationSettings::default())
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("settings", &self.inner.settings)
            .field("len", &self.len())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self, id: &str) -> Option<Entry> {
        let mut entries = self.lock();
        let index = entries.iter().position(|e| e.notification.id == id)?;
        entries.remove(index)
    }

    fn publish(&self) {
        let current: Vec<Notification> = self
            .lock()
            .iter()
            .map(|entry| entry.notification.clone())
            .collect();
        self.snapshot.send_replace(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const EXPIRED: &str = "Your session has expired. Please log in again.";

    fn center() -> NotificationCenter {
        NotificationCenter::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_message_within_window_is_suppressed() {
        let center = center();

        assert!(center.add(EXPIRED, Severity::Error).is_some());
        sleep(Duration::from_secs(1)).await;
        assert!(center.add(EXPIRED, Severity::Error).is_none());

        assert_eq!(center.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_text_different_severity_is_kept() {
        let center = center();

        center.add("Quiz saved", Severity::Success);
        center.add("Quiz saved", Severity::Info);

        assert_eq!(center.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_end_categories_dedup_across_wording() {
        let center = center();

        center.add_with_category(
            EXPIRED,
            Severity::Error,
            NotificationCategory::SessionExpired,
        );
        let second = center.add_with_category(
            "You have been logged out successfully",
            Severity::Success,
            NotificationCategory::Logout,
        );

        assert!(second.is_none());
        assert_eq!(center.list()[0].category, NotificationCategory::SessionExpired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_wording_without_category_is_not_special() {
        let center = center();

        center.add("Logout button moved to the menu", Severity::Info);
        let id = center.add_with_category(
            "You have been logged out successfully",
            Severity::Success,
            NotificationCategory::Logout,
        );

        assert!(id.is_some());
        assert_eq!(center.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest_first() {
        let center = center();

        let first = center.add("first", Severity::Info).unwrap();
        let second = center.add("second", Severity::Info).unwrap();
        let third = center.add("third", Severity::Info).unwrap();

        let ids: Vec<String> = center.list().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second, third]);
        assert!(!center.remove(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_display_duration() {
        let center = center();
        center.add("Chapter created successfully", Severity::Success);

        sleep(Duration::from_millis(3_999)).await;
        assert_eq!(center.len(), 1);

        sleep(Duration::from_millis(2)).await;
        assert!(center.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dedup_window_elapses() {
        let center = NotificationCenter::new(NotificationSettings {
            display_duration: Duration::from_secs(30),
            ..NotificationSettings::default()
        });

        center.add(EXPIRED, Severity::Error);
        sleep(Duration::from_secs(10)).await;

        assert!(center.add(EXPIRED, Severity::Error).is_some());
        assert_eq!(center.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_remove_and_clear() {
        let center = center();
        let id = center.add("one", Severity::Warning).unwrap();
        center.add("two", Severity::Warning);

        assert!(center.remove(&id));
        assert!(!center.remove(&id));
        assert_eq!(center.len(), 1);

        center.clear();
        assert!(center.is_empty());

        // Cancelled timers must not disturb later entries.
        let fresh = center.add("three", Severity::Info).unwrap();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(center.list()[0].id, fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ids_carry_timestamp_prefix() {
        let center = center();
        let id = center.add("hello", Severity::Info).unwrap();

        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_and_event_bus_see_changes() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let center = NotificationCenter::with_parts(
            NotificationSettings::default(),
            Arc::new(SystemClock),
            Some(bus),
        );
        let mut snapshot = center.subscribe();

        let id = center.add("Subject created successfully!", Severity::Success).unwrap();

        snapshot.changed().await.unwrap();
        assert_eq!(snapshot.borrow().len(), 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Notification(NotificationEvent::Added { id: added, .. }) if added == id
        ));

        sleep(Duration::from_secs(5)).await;
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Notification(NotificationEvent::Removed { id: removed }) if removed == id
        ));
        assert!(snapshot.borrow_and_update().is_empty());
    }
}

//! # Core Configuration
//!
//! Everything the client core needs at startup: where the backend lives,
//! how long each class of request may take, how the notification queue
//! behaves, and the host capabilities (HTTP, credential storage, clock).
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://quiz.example.com/api")
//!     .request_timeout(Duration::from_secs(15))
//!     .build()?;
//! ```
//!
//! With the `desktop-shims` feature the builder falls back to
//! `ReqwestHttpClient` and `KeyringSecureStore` when no capability is
//! injected. Without it, missing capabilities fail the build with
//! [`RuntimeError::CapabilityMissing`].

use crate::error::{Result, RuntimeError};
use crate::notifications::NotificationSettings;
use bridge_traits::{Clock, HttpClient, SecureStore, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Backend used when neither the builder nor the environment names one.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Environment variable overriding the backend base URL.
pub const API_BASE_URL_ENV: &str = "QUIZ_MASTER_API_URL";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(100);

/// Request deadlines by call class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Ordinary resource calls.
    pub request: Duration,
    /// "Who am I" probes used by session checks.
    pub probe: Duration,
    /// The token refresh call.
    pub refresh: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: DEFAULT_REQUEST_TIMEOUT,
            probe: DEFAULT_PROBE_TIMEOUT,
            refresh: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL every API path is appended to.
    pub api_base_url: Url,

    pub timeouts: Timeouts,

    pub notifications: NotificationSettings,

    /// Pause between a forced logout and the redirect to the login view.
    pub logout_redirect_delay: Duration,

    /// Event bus buffer size.
    pub event_buffer_size: usize,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("timeouts", &self.timeouts)
            .field("notifications", &self.notifications)
            .field("logout_redirect_delay", &self.logout_redirect_delay)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.cannot_be_a_base() {
            return Err(RuntimeError::Config(format!(
                "API base URL '{}' cannot carry a path",
                self.api_base_url
            )));
        }

        if !matches!(self.api_base_url.scheme(), "http" | "https") {
            return Err(RuntimeError::Config(format!(
                "API base URL must use http or https, got '{}'",
                self.api_base_url.scheme()
            )));
        }

        let timeouts = [
            ("request", self.timeouts.request),
            ("probe", self.timeouts.probe),
            ("refresh", self.timeouts.refresh),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(RuntimeError::Config(format!(
                    "The {} timeout must be greater than zero",
                    name
                )));
            }
        }

        if self.notifications.capacity == 0 {
            return Err(RuntimeError::Config(
                "Notification capacity must be at least 1".to_string(),
            ));
        }

        if self.notifications.display_duration.is_zero() {
            return Err(RuntimeError::Config(
                "Notification display duration must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(RuntimeError::Config(
                "Event buffer size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(RuntimeError::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient implementation is required to reach the quiz backend. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Other hosts: inject a platform adapter with .http_client()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new().map_err(|e| {
        RuntimeError::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(RuntimeError::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "A SecureStore implementation is required to keep the session across restarts. \
                 Desktop: enable the 'desktop-shims' feature to use KeyringSecureStore. \
                 Other hosts: inject platform storage with .secure_store()."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Ok(Arc::new(bridge_desktop::KeyringSecureStore::new()))
}

#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    timeouts: Timeouts,
    notifications: NotificationSettings,
    logout_redirect_delay: Option<Duration>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Starts a builder seeded from the process environment.
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Ok(url) = std::env::var(API_BASE_URL_ENV) {
            if !url.trim().is_empty() {
                builder.api_base_url = Some(url);
            }
        }
        builder
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request = timeout;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.probe = timeout;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.refresh = timeout;
        self
    }

    pub fn notification_display(mut self, duration: Duration) -> Self {
        self.notifications.display_duration = duration;
        self
    }

    pub fn notification_dedup_window(mut self, window: Duration) -> Self {
        self.notifications.dedup_window = window;
        self
    }

    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.notifications.capacity = capacity;
        self
    }

    pub fn logout_redirect_delay(mut self, delay: Duration) -> Self {
        self.logout_redirect_delay = Some(delay);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let raw_url = self
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(raw_url.trim())
            .map_err(|e| RuntimeError::Config(format!("Invalid API base URL '{}': {}", raw_url, e)))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            api_base_url,
            timeouts: self.timeouts,
            notifications: self.notifications,
            logout_redirect_delay: self
                .logout_redirect_delay
                .unwrap_or(DEFAULT_REDIRECT_DELAY),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            secure_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}

//! # Host Bridge Traits
//!
//! Capabilities the client core needs from its host but cannot provide itself.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - single-shot HTTP dispatch, no implicit retries
//! - [`SecureStore`](storage::SecureStore) - durable credential storage that survives restarts
//! - [`Clock`](time::Clock) - wall-clock source, injectable for tests
//! - [`LoggerSink`](time::LoggerSink) - forwards structured logs to a host pipeline
//!
//! ## Fail-Fast Strategy
//!
//! The core refuses to start when a capability is missing instead of silently
//! degrading:
//!
//! ```ignore
//! let http_client = config.http_client.ok_or_else(|| RuntimeError::CapabilityMissing {
//!     capability: "HttpClient".to_string(),
//!     message: "enable the desktop-shims feature or inject an adapter".to_string(),
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so implementations can be shared through
//! `Arc<dyn Trait>` across tokio tasks.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::SecureStore;
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};

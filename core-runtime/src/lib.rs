//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the quiz client crates:
//! - Configuration ([`config::CoreConfig`])
//! - Logging and tracing bootstrap
//! - Event bus ([`events::EventBus`])
//! - The user-facing notification queue ([`notifications::NotificationCenter`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod notifications;

pub use config::{CoreConfig, CoreConfigBuilder, Timeouts};
pub use error::{Result, RuntimeError};
pub use events::{CoreEvent, EventBus};
pub use notifications::{
    Notification, NotificationCategory, NotificationCenter, NotificationSettings, Severity,
};

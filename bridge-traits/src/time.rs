//! Clock and log-forwarding capabilities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Wall-clock source. Notification ids and timestamps come from here so
/// tests can pin them.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One event forwarded to the host's log pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_auth::manager`.
    pub target: String,
    pub message: String,
    /// Structured fields, already redacted.
    pub fields: BTreeMap<String, String>,
    /// Name of the innermost span, if the event was emitted inside one.
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Host log pipeline (system log, crash reporter, remote collector).
///
/// ```ignore
/// use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
///
/// async fn report(sink: &dyn LoggerSink) {
///     let entry = LogEntry::new(LogLevel::Warn, "core_auth::manager", "Token refresh failed")
///         .with_field("status", "503");
///     sink.log(entry).await.ok();
/// }
/// ```
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Entries below this level are dropped before they are built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_millis() {
        let clock = FixedClock(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
        assert_eq!(clock.unix_timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_log_levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(serde_json::to_value(LogLevel::Warn).unwrap(), "warn");
    }

    #[test]
    fn test_log_entry_fields_are_sorted() {
        let entry = LogEntry::new(LogLevel::Warn, "core_auth", "Token refresh failed")
            .with_field("status", "503")
            .with_field("path", "/auth/refresh");

        let keys: Vec<_> = entry.fields.keys().cloned().collect();
        assert_eq!(keys, vec!["path".to_string(), "status".to_string()]);
        assert!(entry.span.is_none());
    }
}

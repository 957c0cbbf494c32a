//! Structured log stream.
//!
//! Every data store write, script `Device.Log` call, fault and bridge state
//! change becomes a [`LogEntry`]. Entries are delivered to subscribers, kept
//! in a bounded recent window and mirrored to `tracing`.

use std::time::Duration;

use serde::Serialize;
use smol_str::SmolStr;

use crate::pubsub::{Hub, Retention, Subscription};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Routine activity.
    Info,
    /// Degraded but recoverable.
    Warning,
    /// Faults and failures.
    Error,
    /// Completed operations worth highlighting.
    Success,
}

impl LogLevel {
    /// Lowercase name as shown to log consumers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// One entry of the log stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Monotonic entry id.
    pub id: u64,
    /// Simulation time of the entry.
    pub timestamp: Duration,
    /// Free-text attribution (device id, `"bridge"`, `"ui"`, ...).
    pub source: SmolStr,
    /// Severity.
    pub level: LogLevel,
    /// Message text.
    pub message: SmolStr,
}

/// Engine-owned log stream.
pub struct LogStream {
    hub: Hub<LogEntry>,
    next_id: u64,
}

impl LogStream {
    /// Creates a stream keeping the last `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            hub: Hub::new(capacity, Retention::RecentWindow),
            next_id: 1,
        }
    }

    /// Appends an entry, mirrors it to `tracing` and notifies subscribers.
    pub fn emit(
        &mut self,
        timestamp: Duration,
        source: &str,
        level: LogLevel,
        message: impl Into<SmolStr>,
    ) -> u64 {
        let entry = LogEntry {
            id: self.next_id,
            timestamp,
            source: SmolStr::new(source),
            level,
            message: message.into(),
        };
        self.next_id += 1;
        match level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(source = %entry.source, "{}", entry.message);
            }
            LogLevel::Warning => tracing::warn!(source = %entry.source, "{}", entry.message),
            LogLevel::Error => tracing::error!(source = %entry.source, "{}", entry.message),
        }
        let id = entry.id;
        self.hub.publish(entry);
        id
    }

    /// Registers a callback for every future entry.
    pub fn subscribe(&self, callback: impl FnMut(&LogEntry) + Send + 'static) -> Subscription {
        self.hub.subscribe(Box::new(callback))
    }

    /// The bounded window of most recent entries, oldest first.
    #[must_use]
    pub fn recent(&self) -> Vec<LogEntry> {
        self.hub.backlog()
    }

    /// Total number of entries emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.next_id - 1
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("emitted", &self.emitted())
            .field("subscribers", &self.hub.subscriber_count())
            .finish()
    }
}

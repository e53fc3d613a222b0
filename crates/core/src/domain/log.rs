// Log Sink - ordered, append-only diagnostic record

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::port::time_provider::{SystemTimeProvider, TimeProvider};

/// Classification of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Warning,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Success => write!(f, "success"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warning => write!(f, "warning"),
        }
    }
}

/// Immutable log record. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub level: LogLevel,
    pub timestamp: i64, // epoch ms
}

/// Append-only, insertion-ordered record of classified messages.
///
/// Entries are only ever appended; `clear` is the single bulk removal,
/// there is no per-entry edit or delete. A subscriber (the CLI printer)
/// receives each entry as it lands.
pub struct LogSink {
    entries: Mutex<Vec<LogEntry>>,
    listener: Mutex<Option<mpsc::UnboundedSender<LogEntry>>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(SystemTimeProvider))
    }

    /// Inject a time provider (deterministic timestamps in tests)
    pub fn with_time_provider(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            listener: Mutex::new(None),
            time_provider,
        }
    }

    /// Stamp current time and append.
    pub fn add(&self, message: impl Into<String>, level: LogLevel) {
        let entry = LogEntry {
            message: message.into(),
            level,
            timestamp: self.time_provider.now_millis(),
        };
        tracing::debug!(level = %entry.level, message = %entry.message, "log entry");
        self.entries.lock().unwrap().push(entry.clone());
        if let Some(tx) = self.listener.lock().unwrap().as_ref() {
            let _ = tx.send(entry);
        }
    }

    /// Empty the sink (explicit user action only).
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Register a live listener. Replaces any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LogEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.listener.lock().unwrap() = Some(tx);
        rx
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

//! Durable mirror of the log sink, one JSON entry per line.
//!
//! The in-memory sink dies with the process; this file is what makes a
//! later `log` invocation able to show what previous runs reported.
//! Append-only like the sink itself; `clear` is the single bulk removal.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use lingflow_core::domain::LogEntry;
use lingflow_core::error::{ClientError, Result};

/// File-backed session log in JSON Lines form.
pub struct SessionLog {
    path: PathBuf,
    guard: Mutex<()>,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry.
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let _lock = self.guard.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::Storage(format!("Failed to create log directory: {}", e))
            })?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ClientError::Storage(format!("Failed to open session log: {}", e)))?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)
            .map_err(|e| ClientError::Storage(format!("Failed to append session log: {}", e)))?;
        Ok(())
    }

    /// All stored entries in insertion order. A missing file is an empty
    /// log; a line truncated by a crash is skipped, not fatal.
    pub fn read_all(&self) -> Result<Vec<LogEntry>> {
        let _lock = self.guard.lock().unwrap();
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ClientError::Storage(format!(
                    "Failed to read session log: {}",
                    e
                )))
            }
        };
        let mut entries = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping unreadable session log line"),
            }
        }
        Ok(entries)
    }

    /// Empty the log (explicit user action only).
    pub fn clear(&self) -> Result<()> {
        let _lock = self.guard.lock().unwrap();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(format!(
                "Failed to clear session log: {}",
                e
            ))),
        }
    }
}

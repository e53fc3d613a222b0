// Progress Stream Line Classification
//
// The remote service signals through substring markers on otherwise
// opaque log lines. The precedence rule is part of the wire contract:
// keep-alive, then error, then done, then plain log text. A line that
// carries both markers is an error.

/// Keep-alive sentinel. Discarded silently, never logged.
pub const KEEP_ALIVE: &str = "[PING]";

/// Substring marking a remote job failure (terminal).
pub const ERROR_MARKER: &str = "[ERROR]";

/// Substring marking workflow completion (terminal).
pub const DONE_MARKER: &str = "[DONE ALL]";

/// Classification of one incoming stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// Liveness sentinel; no log entry, no state change
    KeepAlive,
    /// Terminal failure; the line is logged as an error
    Failed,
    /// Terminal success
    Completed,
    /// Opaque progress text, logged as info
    Line,
}

/// Classify a raw line from the per-job event channel.
pub fn classify(line: &str) -> StreamSignal {
    if line == KEEP_ALIVE {
        StreamSignal::KeepAlive
    } else if line.contains(ERROR_MARKER) {
        StreamSignal::Failed
    } else if line.contains(DONE_MARKER) {
        StreamSignal::Completed
    } else {
        StreamSignal::Line
    }
}

// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (opaque string issued by the remote service)
pub type JobId = String;

/// Transport mode used to create a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Remote path + credential, no file transfer from the client
    Reference,
    /// Client-side archive assembly and transfer
    Upload,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Reference => write!(f, "reference"),
            TransportMode::Upload => write!(f, "upload"),
        }
    }
}

/// Per-job stream lifecycle state.
///
/// `Idle -> Open -> {Done, Failed, Cancelled}`; all three terminal states
/// transition back to `Idle` after teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamState {
    Idle,
    Open,
    Done,
    Failed,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Done | StreamState::Failed | StreamState::Cancelled
        )
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Idle => write!(f, "IDLE"),
            StreamState::Open => write!(f, "OPEN"),
            StreamState::Done => write!(f, "DONE"),
            StreamState::Failed => write!(f, "FAILED"),
            StreamState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Job Entity
///
/// Created on a successful submission response. The id is persisted so a
/// single in-flight job can be resumed across a client restart; the
/// persisted reference is cleared only on a terminal event or explicit
/// cancellation, never on mere teardown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub mode: TransportMode,
    pub state: StreamState,

    pub opened_at: i64, // epoch ms
    pub finished_at: Option<i64>,
}

impl Job {
    /// Create a job in the Open state (submission just succeeded).
    ///
    /// # Arguments
    ///
    /// * `id` - Job id issued by the remote service
    /// * `mode` - Transport mode used to create it
    /// * `opened_at` - Timestamp in epoch ms (injected, not system time)
    pub fn new(id: impl Into<String>, mode: TransportMode, opened_at: i64) -> Self {
        Self {
            id: id.into(),
            mode,
            state: StreamState::Open,
            opened_at,
            finished_at: None,
        }
    }

    /// Transition to Done with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        self.finish(StreamState::Done, now_millis)
    }

    /// Transition to Failed with explicit timestamp
    pub fn fail(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        self.finish(StreamState::Failed, now_millis)
    }

    /// Transition to Cancelled with explicit timestamp
    pub fn cancel(&mut self, now_millis: i64) -> crate::domain::error::Result<()> {
        self.finish(StreamState::Cancelled, now_millis)
    }

    fn finish(&mut self, to: StreamState, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.state != StreamState::Open {
            return Err(crate::domain::error::DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        self.finished_at = Some(now_millis);
        Ok(())
    }
}

// Domain Layer - Entities & pure logic

pub mod error;
pub mod job;
pub mod log;
pub mod stream;

pub use error::DomainError;
pub use job::{Job, JobId, StreamState, TransportMode};
pub use log::{LogEntry, LogLevel, LogSink};
pub use stream::{classify, StreamSignal, DONE_MARKER, ERROR_MARKER, KEEP_ALIVE};

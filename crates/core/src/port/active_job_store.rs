// Active Job Store Port (Interface)
//
// Durable slot for the single in-flight job. Invariant: at most one
// persisted job at a time; a new submission overwrites the old
// reference. Cleared only by finish() or cancellation, never by mere
// teardown, so resume-after-restart keeps working.

use crate::domain::Job;
use crate::error::Result;
use async_trait::async_trait;

/// Persisted slot for the active job record.
#[async_trait]
pub trait ActiveJobStore: Send + Sync {
    /// Persist the job, replacing any previous value
    async fn set(&self, job: &Job) -> Result<()>;

    /// Read the pending job, if any
    async fn get(&self) -> Result<Option<Job>>;

    /// Remove the job (terminal event or cancellation)
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::TransportMode;
    use std::sync::Mutex;

    /// In-memory active job store for tests.
    #[derive(Default)]
    pub struct MemoryActiveJobStore {
        job: Mutex<Option<Job>>,
    }

    impl MemoryActiveJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_job(job_id: impl Into<String>, mode: TransportMode) -> Self {
            Self {
                job: Mutex::new(Some(Job::new(job_id, mode, 0))),
            }
        }
    }

    #[async_trait]
    impl ActiveJobStore for MemoryActiveJobStore {
        async fn set(&self, job: &Job) -> Result<()> {
            *self.job.lock().unwrap() = Some(job.clone());
            Ok(())
        }

        async fn get(&self) -> Result<Option<Job>> {
            Ok(self.job.lock().unwrap().clone())
        }

        async fn clear(&self) -> Result<()> {
            *self.job.lock().unwrap() = None;
            Ok(())
        }
    }
}

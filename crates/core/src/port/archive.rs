// Archive Assembler Port (Interface)

use std::sync::Arc;

use crate::error::Result;
use async_trait::async_trait;

/// Progress callback: percentage 0-100, monotonically non-decreasing.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// One file selected for upload, with the path it keeps inside the
/// archive (so a selected directory's structure is preserved).
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub relative_path: String,
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(relative_path: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents,
        }
    }
}

/// Builds a single compressed container in memory from a file set.
///
/// Empty input is the caller's responsibility: the Job Submitter rejects
/// the submission before this port is ever invoked.
#[async_trait]
pub trait ArchiveAssembler: Send + Sync {
    async fn assemble(&self, files: &[SourceFile], progress: ProgressFn) -> Result<Vec<u8>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Mock assembler: records invocations, emits a scripted progress
    /// ramp, returns fixed bytes.
    pub struct MockAssembler {
        call_count: Mutex<usize>,
        output: Vec<u8>,
        progress_steps: Vec<u8>,
    }

    impl MockAssembler {
        pub fn new() -> Self {
            Self {
                call_count: Mutex::new(0),
                output: b"mock-archive".to_vec(),
                progress_steps: vec![0, 50, 100],
            }
        }

        pub fn with_progress(steps: Vec<u8>) -> Self {
            Self {
                progress_steps: steps,
                ..Self::new()
            }
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    impl Default for MockAssembler {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ArchiveAssembler for MockAssembler {
        async fn assemble(&self, _files: &[SourceFile], progress: ProgressFn) -> Result<Vec<u8>> {
            *self.call_count.lock().unwrap() += 1;
            for pct in &self.progress_steps {
                progress(*pct);
            }
            Ok(self.output.clone())
        }
    }
}

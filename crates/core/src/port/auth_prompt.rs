// Auth Prompt Port (Interface)
//
// Opens the provider's authentication entry page in a detached window.
// There is no completion (or failure) signal on this path: if the window
// is blocked or closed, the session simply stays disconnected. Completion
// arrives out of band through the handoff signals.

use crate::error::Result;

/// Launches the out-of-band authentication flow.
pub trait AuthPrompt: Send + Sync {
    fn open(&self) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records open() calls; never produces a completion by itself.
    #[derive(Default)]
    pub struct MockPrompt {
        open_count: Mutex<usize>,
    }

    impl MockPrompt {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn open_count(&self) -> usize {
            *self.open_count.lock().unwrap()
        }
    }

    impl AuthPrompt for MockPrompt {
        fn open(&self) -> Result<()> {
            *self.open_count.lock().unwrap() += 1;
            Ok(())
        }
    }
}

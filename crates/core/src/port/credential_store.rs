// Credential Store Port (Interface)
//
// At most one live access token per process, backed by storage that
// outlives a single run and is visible to other processes of the same
// user. Staleness is the remote service's concern; this port never
// expires anything.

use crate::error::Result;
use async_trait::async_trait;

/// Persisted slot for the single access token.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store the token, replacing any previous value
    async fn set(&self, token: &str) -> Result<()>;

    /// Read the current token, if any
    async fn get(&self) -> Result<Option<String>>;

    /// Remove the token (explicit logout)
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory credential store. Counts writes so idempotence tests can
    /// assert the token was set exactly once.
    #[derive(Default)]
    pub struct MemoryCredentialStore {
        token: Mutex<Option<String>>,
        set_count: Mutex<usize>,
    }

    impl MemoryCredentialStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_token(token: impl Into<String>) -> Self {
            Self {
                token: Mutex::new(Some(token.into())),
                set_count: Mutex::new(0),
            }
        }

        pub fn set_count(&self) -> usize {
            *self.set_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn set(&self, token: &str) -> Result<()> {
            *self.token.lock().unwrap() = Some(token.to_string());
            *self.set_count.lock().unwrap() += 1;
            Ok(())
        }

        async fn get(&self) -> Result<Option<String>> {
            Ok(self.token.lock().unwrap().clone())
        }

        async fn clear(&self) -> Result<()> {
            *self.token.lock().unwrap() = None;
            Ok(())
        }
    }
}

// Application Layer - Use cases

pub mod auth;
pub mod streamer;
pub mod submit;

pub use auth::{AuthSession, AuthSignal, AuthState};
pub use streamer::ProgressConsumer;
pub use submit::{JobSubmitter, SubmitRequest};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "processing" flag.
///
/// Advisory mutual exclusion against a second concurrent submission from
/// the same client instance. Not a lock: nothing queues behind it, the
/// caller is simply expected not to submit while it is set.
#[derive(Clone, Default)]
pub struct ProcessingFlag {
    inner: Arc<AtomicBool>,
}

impl ProcessingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, processing: bool) {
        self.inner.store(processing, Ordering::SeqCst);
    }

    pub fn is_processing(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

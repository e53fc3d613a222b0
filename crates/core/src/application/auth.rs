// Auth Handoff Session
//
// Coordinates the out-of-band authentication flow. The detached auth
// window completes by signaling the opener over two independent,
// redundant paths (credential-storage mutation, direct callback); this
// session reacts to whichever arrives first and makes every later
// observation a no-op: at-least-once delivery, exactly-once effect.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{LogLevel, LogSink};
use crate::error::Result;
use crate::port::{AuthPrompt, CredentialStore};

/// Connection state toward the storage provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Disconnected,
    Connected,
}

/// Completion signal from either handoff path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSignal {
    /// A credential became available (carried by the signal itself)
    TokenReady(String),
}

/// Owns the handoff state machine.
pub struct AuthSession {
    credentials: Arc<dyn CredentialStore>,
    sink: Arc<LogSink>,
    state: AuthState,
    // Once-guard: the idempotent "mark-connected" effect fired already.
    // A plain flag instead of listener unregistration avoids
    // removal-ordering bugs between the two signal paths.
    handled: bool,
}

impl AuthSession {
    pub fn new(credentials: Arc<dyn CredentialStore>, sink: Arc<LogSink>) -> Self {
        Self {
            credentials,
            sink,
            state: AuthState::Disconnected,
            handled: false,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == AuthState::Connected
    }

    /// Adopt a credential persisted by a prior session, if present.
    /// Returns true when one was found.
    pub async fn restore(&mut self) -> Result<bool> {
        if let Some(_token) = self.credentials.get().await? {
            self.state = AuthState::Connected;
            self.handled = true;
            self.sink.add("Restored stored access token", LogLevel::Success);
            info!("Restored access token from prior session");
            return Ok(true);
        }
        Ok(false)
    }

    /// Open the detached authentication window.
    ///
    /// No failure signal exists on this path: a blocked or abandoned
    /// window leaves the session disconnected indefinitely.
    pub fn connect(&self, prompt: &dyn AuthPrompt) -> Result<()> {
        self.sink.add("Opening authentication window", LogLevel::Info);
        prompt.open()
    }

    /// The idempotent mark-connected operation, invoked from every
    /// registered signal path. Only the first observation has effect;
    /// returns whether this call was the effective one.
    pub async fn observe(&mut self, signal: AuthSignal) -> Result<bool> {
        if self.handled {
            debug!("Duplicate auth signal ignored");
            return Ok(false);
        }
        let AuthSignal::TokenReady(token) = signal;
        self.handled = true;
        self.credentials.set(&token).await?;
        self.state = AuthState::Connected;
        self.sink.add("Connected to remote storage", LogLevel::Success);
        info!("Auth handoff completed");
        Ok(true)
    }

    /// Clear the credential and disconnect. Re-arms the once-guard so a
    /// later handoff can succeed; does not close any open window.
    pub async fn logout(&mut self) -> Result<()> {
        self.credentials.clear().await?;
        self.state = AuthState::Disconnected;
        self.handled = false;
        self.sink.add("Logged out", LogLevel::Info);
        info!("Logged out");
        Ok(())
    }
}

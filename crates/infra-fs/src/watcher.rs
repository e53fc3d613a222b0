//! Credential watcher - the storage-mutation signal path.
//!
//! The detached auth window writes the token into the shared state file;
//! this watcher polls that file and emits an `AuthSignal` when a token
//! appears or changes. Redundant with the loopback callback path; the
//! AuthSession deduplicates whichever arrives second.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lingflow_core::application::AuthSignal;
use lingflow_core::port::CredentialStore;

use crate::FileStateStore;

/// Spawn a polling watcher over the credential slot. The task ends when
/// the receiving side of `tx` is dropped.
pub fn watch_credentials(
    store: Arc<FileStateStore>,
    tx: mpsc::UnboundedSender<AuthSignal>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last_seen: Option<String> = None;
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                debug!("Credential watcher stopping (receiver gone)");
                return;
            }
            let token = match CredentialStore::get(store.as_ref()).await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Credential watcher read failed");
                    continue;
                }
            };
            if let Some(token) = token {
                if last_seen.as_deref() != Some(token.as_str()) {
                    debug!("Credential mutation observed");
                    last_seen = Some(token.clone());
                    if tx.send(AuthSignal::TokenReady(token)).is_err() {
                        return;
                    }
                }
            } else {
                last_seen = None;
            }
        }
    })
}

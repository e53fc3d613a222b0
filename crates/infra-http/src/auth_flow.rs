//! Auth handoff adapters - the direct-message signal path.
//!
//! `BrowserPrompt` opens the provider's auth entry page in a detached
//! browser window. `CallbackListener` is a loopback listener the auth
//! window redirects back to with the access token; it emits the same
//! `AuthSignal` as the credential-file watcher, and the AuthSession
//! deduplicates whichever path fires second.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lingflow_core::application::AuthSignal;
use lingflow_core::error::{ClientError, Result};
use lingflow_core::port::AuthPrompt;

const CALLBACK_PAGE: &str =
    "<html><body><p>Authentication complete. You can close this window.</p></body></html>";

/// Opens the authentication entry path in a detached window.
pub struct BrowserPrompt {
    auth_url: String,
}

impl BrowserPrompt {
    pub fn new(base_url: &str, redirect_uri: &str) -> Self {
        Self {
            auth_url: format!(
                "{}/auth/start?redirect_uri={}",
                base_url.trim_end_matches('/'),
                redirect_uri
            ),
        }
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }
}

impl AuthPrompt for BrowserPrompt {
    fn open(&self) -> Result<()> {
        info!(url = %self.auth_url, "Opening authentication window");
        open::that(&self.auth_url)
            .map_err(|e| ClientError::Internal(format!("Failed to open browser: {}", e)))
    }
}

/// Pull the access token out of the redirect request line,
/// e.g. `GET /callback?access_token=abc HTTP/1.1`. The value arrives
/// percent-encoded in the query string and is decoded before use.
fn extract_token(request_line: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split('?').nth(1)?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != "access_token" {
            return None;
        }
        let decoded = urlencoding::decode(value).ok()?;
        (!decoded.is_empty()).then(|| decoded.into_owned())
    })
}

async fn handle_connection(mut stream: TcpStream) -> Option<String> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;

    let token = extract_token(&request_line);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        CALLBACK_PAGE.len(),
        CALLBACK_PAGE
    );
    if let Err(e) = write_half.write_all(response.as_bytes()).await {
        warn!(error = %e, "Failed to answer auth callback");
    }
    token
}

/// Loopback listener for the auth redirect.
pub struct CallbackListener {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind an ephemeral 127.0.0.1 port and start accepting redirects.
    /// Every carried token is forwarded as an `AuthSignal`.
    pub async fn bind(tx: mpsc::UnboundedSender<AuthSignal>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_addr = listener.local_addr()?;
        debug!(addr = %local_addr, "Auth callback listener bound");

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, peer)) = listener.accept().await else {
                    return;
                };
                debug!(peer = %peer, "Auth callback connection");
                if let Some(token) = handle_connection(stream).await {
                    if tx.send(AuthSignal::TokenReady(token)).is_err() {
                        return;
                    }
                }
                if tx.is_closed() {
                    return;
                }
            }
        });

        Ok(Self { local_addr, handle })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://{}/callback", self.local_addr)
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

//! Server-sent-event consumer over a raw byte stream.
//!
//! The progress channel is a one-way text-event stream whose `data:`
//! payloads are raw log lines. Parsing is deliberately liberal: comment
//! lines are dropped, `data:` prefixes are stripped, anything else
//! non-empty passes through untouched.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use lingflow_core::error::{ClientError, Result};
use lingflow_core::port::EventStream;

/// Extract the payload of one wire line, if it carries one.
fn parse_sse_line(line: &str) -> Option<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    match line.strip_prefix("data:") {
        Some(rest) => Some(rest.strip_prefix(' ').unwrap_or(rest).to_string()),
        None => Some(line.to_string()),
    }
}

/// EventStream implementation over chunked SSE bytes.
pub struct SseStream {
    inner: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, ClientError>> + Send>>,
    buffer: Vec<u8>,
    done: bool,
}

impl SseStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, ClientError>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Pop the next complete line out of the buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).take(pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

#[async_trait]
impl EventStream for SseStream {
    async fn next(&mut self) -> Result<Option<String>> {
        loop {
            while let Some(line) = self.take_line() {
                if let Some(payload) = parse_sse_line(&line) {
                    return Ok(Some(payload));
                }
            }
            if self.done {
                // Flush a final unterminated line, then EOF
                if !self.buffer.is_empty() {
                    let rest = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.buffer.clear();
                    if let Some(payload) = parse_sse_line(&rest) {
                        return Ok(Some(payload));
                    }
                }
                return Ok(None);
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => self.done = true,
            }
        }
    }
}

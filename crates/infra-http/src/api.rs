//! HTTP implementation of the Job API port.
//!
//! Wire contract:
//! - `POST {base}/jobs/process` - multipart form; `base_dir` +
//!   `access_token` in reference mode, a `zipfile` part in upload mode.
//!   2xx carries JSON `{ "job_id" }`, non-2xx a plain-text error body.
//! - `POST {base}/jobs/cancel` - JSON `{ "job_id" }`, response not
//!   contract-checked.
//! - `GET {base}/jobs/{id}/stream` - text/event-stream of raw lines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, info};

use lingflow_core::domain::JobId;
use lingflow_core::error::{ClientError, Result};
use lingflow_core::port::{EventStream, JobApi, ProgressFn, SubmitParams};

use crate::sse::SseStream;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: JobId,
}

/// Job API over reqwest.
pub struct HttpJobApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpJobApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // No overall request timeout: the event stream stays open for the
        // whole job; the remote's keep-alive lines are the liveness signal.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("lingflow/{}", lingflow_core::VERSION))
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn params_form(params: &SubmitParams) -> multipart::Form {
        multipart::Form::new()
            .text("action", params.action.clone())
            .text("instruction", params.instruction.clone())
            .text("language", params.language.clone())
    }

    async fn post_process(&self, form: multipart::Form) -> Result<JobId> {
        let url = format!("{}/jobs/process", self.base_url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(format!("Malformed submission response: {}", e)))?;
        info!(job_id = %parsed.job_id, "Submission accepted");
        Ok(parsed.job_id)
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn submit_reference(
        &self,
        params: &SubmitParams,
        base_dir: &str,
        access_token: &str,
    ) -> Result<JobId> {
        debug!(base_dir = %base_dir, "Submitting reference-mode job");
        let form = Self::params_form(params)
            .text("base_dir", base_dir.to_string())
            .text("access_token", access_token.to_string());
        self.post_process(form).await
    }

    async fn submit_upload(
        &self,
        params: &SubmitParams,
        archive: Vec<u8>,
        progress: ProgressFn,
    ) -> Result<JobId> {
        let total = archive.len() as u64;
        debug!(bytes = total, "Submitting upload-mode job");

        // Chunked body so transfer progress can be derived from
        // bytes-sent over bytes-total as hyper pulls the stream.
        let chunks: Vec<Vec<u8>> = archive
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(|c| c.to_vec())
            .collect();
        let sent = Arc::new(AtomicU64::new(0));
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            let sent = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
            let pct = if total == 0 {
                100
            } else {
                ((sent * 100) / total) as u8
            };
            progress(pct);
            Ok::<_, std::io::Error>(chunk)
        }));

        let part = multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name("upload.zip")
            .mime_str("application/zip")
            .map_err(|e| ClientError::Internal(format!("Invalid mime type: {}", e)))?;

        let form = Self::params_form(params).part("zipfile", part);
        self.post_process(form).await
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        let url = format!("{}/jobs/cancel", self.base_url);
        // Fire-and-forget: only transport failures are reported; the
        // response body and status are not contract-checked.
        self.http
            .post(&url)
            .json(&serde_json::json!({ "job_id": job_id }))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        debug!(job_id = %job_id, "Cancellation request completed");
        Ok(())
    }

    async fn open_stream(&self, job_id: &str) -> Result<Box<dyn EventStream>> {
        let url = format!("{}/jobs/{}/stream", self.base_url, job_id);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        debug!(job_id = %job_id, "Event stream opened");
        let stream = response
            .bytes_stream()
            .map_err(|e| ClientError::Network(e.to_string()));
        Ok(Box::new(SseStream::new(stream)))
    }
}

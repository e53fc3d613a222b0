// Job Submitter - submission use case


use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::application::ProcessingFlag;
use crate::domain::{JobId, LogLevel, LogSink, TransportMode};
use crate::error::ClientError;
use crate::port::{ArchiveAssembler, CredentialStore, JobApi, ProgressFn, SourceFile};

/// Submission request.
///
/// `base_dir` is required in reference mode, `files` in upload mode.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub mode: TransportMode,
    pub action: String,
    pub instruction: String,
    pub language: String,
    pub base_dir: Option<String>,
    pub files: Vec<SourceFile>,
}

impl SubmitRequest {
    fn params(&self) -> crate::port::SubmitParams {
        crate::port::SubmitParams {
            action: self.action.clone(),
            instruction: self.instruction.clone(),
            language: self.language.clone(),
        }
    }
}

/// Validate the textual parameters common to both modes.
pub fn validate_request(req: &SubmitRequest) -> Result<(), ClientError> {
    for (name, value) in [
        ("action", &req.action),
        ("instruction", &req.instruction),
        ("language", &req.language),
    ] {
        if value.trim().is_empty() {
            return Err(ClientError::Validation(format!(
                "Missing required parameter: {}",
                name
            )));
        }
    }
    if req.mode == TransportMode::Reference
        && req.base_dir.as_deref().map_or(true, |d| d.trim().is_empty())
    {
        return Err(ClientError::Validation(
            "Missing remote directory path".to_string(),
        ));
    }
    Ok(())
}

/// Job Submitter service.
///
/// Every failure resolves to an error-classified log entry and a return
/// to the idle, resubmittable state; nothing retries automatically.
pub struct JobSubmitter {
    api: Arc<dyn JobApi>,
    credentials: Arc<dyn CredentialStore>,
    assembler: Arc<dyn ArchiveAssembler>,
    sink: Arc<LogSink>,
    processing: ProcessingFlag,
}

impl JobSubmitter {
    pub fn new(
        api: Arc<dyn JobApi>,
        credentials: Arc<dyn CredentialStore>,
        assembler: Arc<dyn ArchiveAssembler>,
        sink: Arc<LogSink>,
        processing: ProcessingFlag,
    ) -> Self {
        Self {
            api,
            credentials,
            assembler,
            sink,
            processing,
        }
    }

    /// Submit a job. Returns the issued job id, or `None` when the
    /// attempt was rejected or failed - the reason is already in the log
    /// sink, and the processing flag is back at false.
    ///
    /// Precondition failures (missing token, missing files, missing
    /// parameters) never reach the network and never set the flag.
    pub async fn submit(&self, req: SubmitRequest) -> Option<JobId> {
        if let Err(e) = validate_request(&req) {
            self.reject(e.user_message());
            return None;
        }

        // Mode-specific preconditions, checked before any state mutation
        let token = match req.mode {
            TransportMode::Reference => {
                match self.credentials.get().await {
                    Ok(Some(token)) => Some(token),
                    Ok(None) => {
                        self.reject("No access token - connect to remote storage first");
                        return None;
                    }
                    Err(e) => {
                        self.reject(e.user_message());
                        return None;
                    }
                }
            }
            TransportMode::Upload => {
                if req.files.is_empty() {
                    self.reject("No files selected for upload");
                    return None;
                }
                None
            }
        };

        self.processing.set(true);
        self.sink.add("Submitting job", LogLevel::Info);
        info!(mode = %req.mode, "Submitting job");

        let result = match req.mode {
            TransportMode::Reference => {
                let base_dir = req.base_dir.as_deref().unwrap_or_default();
                self.api
                    .submit_reference(&req.params(), base_dir, &token.unwrap_or_default())
                    .await
            }
            TransportMode::Upload => self.submit_upload(&req).await,
        };

        match result {
            Ok(job_id) => {
                info!(job_id = %job_id, "Job accepted");
                Some(job_id)
            }
            Err(e) => {
                warn!(error = %e, "Submission failed");
                self.sink.add(e.user_message(), LogLevel::Error);
                self.processing.set(false);
                None
            }
        }
    }

    async fn submit_upload(&self, req: &SubmitRequest) -> Result<JobId, ClientError> {
        self.sink.add("Packing files", LogLevel::Info);
        let packing = progress_logger(self.sink.clone(), "Packing");
        let archive = self.assembler.assemble(&req.files, packing).await?;

        self.sink.add("Uploading archive", LogLevel::Info);
        let uploading = progress_logger(self.sink.clone(), "Uploading");
        self.api.submit_upload(&req.params(), archive, uploading).await
    }

    fn reject(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(reason = %message, "Submission rejected");
        self.sink.add(message, LogLevel::Error);
    }
}

/// Progress callback that logs "{label} N%" lines, skipping repeats so
/// the reported percentage is strictly increasing.
fn progress_logger(sink: Arc<LogSink>, label: &'static str) -> ProgressFn {
    let last = Mutex::new(None::<u8>);
    Arc::new(move |pct: u8| {
        let pct = pct.min(100);
        let mut last = last.lock().unwrap();
        if last.map_or(true, |prev| pct > prev) {
            *last = Some(pct);
            sink.add(format!("{} {}%", label, pct), LogLevel::Info);
        }
    })
}

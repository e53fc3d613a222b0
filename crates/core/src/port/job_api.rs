// Job API Port (Interface)
//
// The remote processing service, reachable only through the documented
// wire contract: multipart submission, JSON cancellation, one-way
// per-job event stream.

use crate::domain::JobId;
use crate::error::Result;
use crate::port::archive::ProgressFn;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Required textual parameters, common to both transport modes.
/// Non-empty by the time they reach this port (validated by the caller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitParams {
    pub action: String,
    pub instruction: String,
    pub language: String,
}

/// One live subscription to a job's event channel.
///
/// Events arrive and are processed in order; `next` yields `None` when
/// the remote side closes the channel.
#[async_trait]
pub trait EventStream: Send {
    async fn next(&mut self) -> Result<Option<String>>;
}

impl std::fmt::Debug for dyn EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventStream")
    }
}

/// Remote job service interface.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Reference mode: remote path + credential, no file transfer.
    async fn submit_reference(
        &self,
        params: &SubmitParams,
        base_dir: &str,
        access_token: &str,
    ) -> Result<JobId>;

    /// Upload mode: archive bytes as a multipart payload. `progress`
    /// reports transfer percentage (bytes-sent / bytes-total).
    async fn submit_upload(
        &self,
        params: &SubmitParams,
        archive: Vec<u8>,
        progress: ProgressFn,
    ) -> Result<JobId>;

    /// Best-effort cancellation; the response body is not contract-checked.
    async fn cancel(&self, job_id: &str) -> Result<()>;

    /// Subscribe to the per-job one-way event channel.
    async fn open_stream(&self, job_id: &str) -> Result<Box<dyn EventStream>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Stream that replays a scripted sequence of lines, then EOF.
    pub struct ScriptedStream {
        lines: VecDeque<String>,
    }

    impl ScriptedStream {
        pub fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl EventStream for ScriptedStream {
        async fn next(&mut self) -> Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
    }

    /// Mock behavior for submissions
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Accept and return this job id
        Accept(String),
        /// Non-2xx with server-provided error body
        Reject { status: u16, body: String },
        /// Network failure before any response
        NetworkFail(String),
    }

    /// Recorded submission call
    #[derive(Debug, Clone)]
    pub enum RecordedCall {
        Reference {
            params: SubmitParams,
            base_dir: String,
            access_token: String,
        },
        Upload {
            params: SubmitParams,
            archive_len: usize,
        },
        Cancel {
            job_id: String,
        },
        OpenStream {
            job_id: String,
        },
    }

    /// Mock Job API: scripted behavior, records every call, serves
    /// scripted event streams per job id.
    pub struct MockJobApi {
        behavior: Mutex<MockBehavior>,
        calls: Mutex<Vec<RecordedCall>>,
        stream_lines: Mutex<Vec<String>>,
    }

    impl MockJobApi {
        pub fn accepting(job_id: impl Into<String>) -> Self {
            Self {
                behavior: Mutex::new(MockBehavior::Accept(job_id.into())),
                calls: Mutex::new(Vec::new()),
                stream_lines: Mutex::new(Vec::new()),
            }
        }

        pub fn rejecting(status: u16, body: impl Into<String>) -> Self {
            Self {
                behavior: Mutex::new(MockBehavior::Reject {
                    status,
                    body: body.into(),
                }),
                calls: Mutex::new(Vec::new()),
                stream_lines: Mutex::new(Vec::new()),
            }
        }

        pub fn network_failing(msg: impl Into<String>) -> Self {
            Self {
                behavior: Mutex::new(MockBehavior::NetworkFail(msg.into())),
                calls: Mutex::new(Vec::new()),
                stream_lines: Mutex::new(Vec::new()),
            }
        }

        /// Lines every opened stream will replay before EOF.
        pub fn script_stream(&self, lines: &[&str]) {
            *self.stream_lines.lock().unwrap() =
                lines.iter().map(|s| s.to_string()).collect();
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn submit_result(&self) -> Result<JobId> {
            match self.behavior.lock().unwrap().clone() {
                MockBehavior::Accept(id) => Ok(id),
                MockBehavior::Reject { status, body } => {
                    Err(crate::error::ClientError::Api {
                        status,
                        message: body,
                    })
                }
                MockBehavior::NetworkFail(msg) => {
                    Err(crate::error::ClientError::Network(msg))
                }
            }
        }
    }

    #[async_trait]
    impl JobApi for MockJobApi {
        async fn submit_reference(
            &self,
            params: &SubmitParams,
            base_dir: &str,
            access_token: &str,
        ) -> Result<JobId> {
            self.calls.lock().unwrap().push(RecordedCall::Reference {
                params: params.clone(),
                base_dir: base_dir.to_string(),
                access_token: access_token.to_string(),
            });
            self.submit_result()
        }

        async fn submit_upload(
            &self,
            params: &SubmitParams,
            archive: Vec<u8>,
            progress: ProgressFn,
        ) -> Result<JobId> {
            self.calls.lock().unwrap().push(RecordedCall::Upload {
                params: params.clone(),
                archive_len: archive.len(),
            });
            progress(100);
            self.submit_result()
        }

        async fn cancel(&self, job_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(RecordedCall::Cancel {
                job_id: job_id.to_string(),
            });
            Ok(())
        }

        async fn open_stream(&self, job_id: &str) -> Result<Box<dyn EventStream>> {
            self.calls.lock().unwrap().push(RecordedCall::OpenStream {
                job_id: job_id.to_string(),
            });
            let lines: Vec<String> = self.stream_lines.lock().unwrap().clone();
            let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
            Ok(Box::new(ScriptedStream::new(&refs)))
        }
    }
}

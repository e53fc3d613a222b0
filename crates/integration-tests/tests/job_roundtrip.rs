//! Full submit-then-follow flow over real adapters and a mock remote.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lingflow_core::application::{
    JobSubmitter, ProcessingFlag, ProgressConsumer, SubmitRequest,
};
use lingflow_core::domain::{LogLevel, LogSink, StreamState, TransportMode};
use lingflow_core::port::time_provider::SystemTimeProvider;
use lingflow_core::port::{ActiveJobStore, CredentialStore, SourceFile};
use lingflow_infra_fs::{FileStateStore, ZipAssembler};
use lingflow_infra_http::HttpJobApi;

struct World {
    _dir: tempfile::TempDir,
    store: Arc<FileStateStore>,
    api: Arc<HttpJobApi>,
    sink: Arc<LogSink>,
    processing: ProcessingFlag,
}

impl World {
    fn new(server: &MockServer) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStateStore::new(dir.path().join("state.json")));
        let api = Arc::new(HttpJobApi::new(server.uri()).unwrap());
        Self {
            _dir: dir,
            store,
            api,
            sink: Arc::new(LogSink::new()),
            processing: ProcessingFlag::new(),
        }
    }

    fn submitter(&self) -> JobSubmitter {
        JobSubmitter::new(
            self.api.clone(),
            self.store.clone(),
            Arc::new(ZipAssembler::new()),
            self.sink.clone(),
            self.processing.clone(),
        )
    }

    fn consumer(&self) -> ProgressConsumer {
        ProgressConsumer::new(
            self.api.clone(),
            self.store.clone(),
            self.sink.clone(),
            self.processing.clone(),
            Arc::new(SystemTimeProvider),
        )
    }

    async fn pending_job_id(&self) -> Option<String> {
        ActiveJobStore::get(self.store.as_ref())
            .await
            .unwrap()
            .map(|j| j.id)
    }
}

fn upload_request() -> SubmitRequest {
    SubmitRequest {
        mode: TransportMode::Upload,
        action: "transcribe".to_string(),
        instruction: "diplomatic".to_string(),
        language: "la".to_string(),
        base_dir: None,
        files: vec![
            SourceFile::new("folio/001r.txt", b"in principio".to_vec()),
            SourceFile::new("folio/001v.txt", b"erat verbum".to_vec()),
        ],
    }
}

async fn mount_stream(server: &MockServer, job_id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{}/stream", job_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_upload_submit_then_follow_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs/process"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "job_id": "itg-1" })),
        )
        .mount(&server)
        .await;
    mount_stream(
        &server,
        "itg-1",
        "data: [PING]\n\ndata: Transcribing folio 001r\n\ndata: [DONE ALL]\n\n",
    )
    .await;

    let world = World::new(&server);
    let job_id = world.submitter().submit(upload_request()).await.unwrap();
    assert_eq!(job_id, "itg-1");
    assert!(world.processing.is_processing());

    let mut consumer = world.consumer();
    consumer.open(&job_id, TransportMode::Upload).await.unwrap();
    assert_eq!(world.pending_job_id().await.as_deref(), Some("itg-1"));

    let state = consumer.follow().await.unwrap();
    assert_eq!(state, StreamState::Done);
    assert!(!world.processing.is_processing());
    assert_eq!(world.pending_job_id().await, None);

    let entries = world.sink.entries();
    let last = entries.last().unwrap();
    assert_eq!(last.message, "Workflow complete");
    assert_eq!(last.level, LogLevel::Success);
    assert!(entries
        .iter()
        .any(|e| e.message == "Transcribing folio 001r" && e.level == LogLevel::Info));
    // The keep-alive never reaches the sink
    assert!(entries.iter().all(|e| e.message != "[PING]"));
}

#[tokio::test]
async fn test_reference_submit_requires_stored_token() {
    let server = MockServer::start().await;
    let world = World::new(&server);

    let request = SubmitRequest {
        mode: TransportMode::Reference,
        action: "gloss".to_string(),
        instruction: "interlinear".to_string(),
        language: "grc".to_string(),
        base_dir: Some("/corpus/psalter".to_string()),
        files: Vec::new(),
    };

    // No token stored, so nothing may reach the network (no mock is
    // mounted; a request would 404 and surface as an API error instead).
    assert!(world.submitter().submit(request.clone()).await.is_none());
    assert!(!world.processing.is_processing());
    assert!(world
        .sink
        .entries()
        .iter()
        .any(|e| e.level == LogLevel::Error));
    assert!(server.received_requests().await.unwrap().is_empty());

    // With a token the same request goes through.
    Mock::given(method("POST"))
        .and(path("/jobs/process"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "job_id": "itg-2" })),
        )
        .mount(&server)
        .await;
    CredentialStore::set(world.store.as_ref(), "tok-ref").await.unwrap();
    let job_id = world.submitter().submit(request).await.unwrap();
    assert_eq!(job_id, "itg-2");
}

#[tokio::test]
async fn test_error_marker_fails_the_job_and_clears_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs/process"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "job_id": "itg-3" })),
        )
        .mount(&server)
        .await;
    mount_stream(
        &server,
        "itg-3",
        "data: step one\n\ndata: [ERROR] model unavailable\n\ndata: [DONE ALL]\n\n",
    )
    .await;

    let world = World::new(&server);
    let job_id = world.submitter().submit(upload_request()).await.unwrap();

    let mut consumer = world.consumer();
    consumer.open(&job_id, TransportMode::Upload).await.unwrap();
    let state = consumer.follow().await.unwrap();

    // The error sentinel wins even though a done marker follows it
    assert_eq!(state, StreamState::Failed);
    assert!(!world.processing.is_processing());
    assert_eq!(world.pending_job_id().await, None);
    assert!(world
        .sink
        .entries()
        .iter()
        .any(|e| e.message.contains("model unavailable") && e.level == LogLevel::Error));
}

#[tokio::test]
async fn test_cancel_posts_and_tears_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs/process"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "job_id": "itg-4" })),
        )
        .mount(&server)
        .await;
    mount_stream(&server, "itg-4", "data: [PING]\n\n").await;
    Mock::given(method("POST"))
        .and(path("/jobs/cancel"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let world = World::new(&server);
    let job_id = world.submitter().submit(upload_request()).await.unwrap();
    let mut consumer = world.consumer();
    consumer.open(&job_id, TransportMode::Upload).await.unwrap();
    // Short stream body: drain it, no terminal marker arrives
    let state = consumer.follow().await.unwrap();
    assert_eq!(state, StreamState::Open);

    assert!(consumer.cancel().await.unwrap());
    assert!(!world.processing.is_processing());
    assert_eq!(world.pending_job_id().await, None);
    // A second cancel finds nothing pending
    assert!(!consumer.cancel().await.unwrap());
}

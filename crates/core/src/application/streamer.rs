// Progress Stream Consumer
//
// Owns the single live subscription to a job's event channel and the
// persisted job record that lets the subscription be reestablished after
// a client restart. Per job: Open -> {Done, Failed, Cancelled}, driven
// through the entity's guarded transitions; the record is destroyed on
// the terminal event, returning the consumer to Idle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::ProcessingFlag;
use crate::domain::stream::{classify, StreamSignal};
use crate::domain::{Job, JobId, LogLevel, LogSink, StreamState, TransportMode};
use crate::error::{ClientError, Result};
use crate::port::{ActiveJobStore, EventStream, JobApi, TimeProvider};

/// Consumes the per-job one-way event stream.
pub struct ProgressConsumer {
    api: Arc<dyn JobApi>,
    job_store: Arc<dyn ActiveJobStore>,
    sink: Arc<LogSink>,
    processing: ProcessingFlag,
    time_provider: Arc<dyn TimeProvider>,
    subscription: Option<Box<dyn EventStream>>,
    job: Option<Job>,
}

impl ProgressConsumer {
    pub fn new(
        api: Arc<dyn JobApi>,
        job_store: Arc<dyn ActiveJobStore>,
        sink: Arc<LogSink>,
        processing: ProcessingFlag,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            api,
            job_store,
            sink,
            processing,
            time_provider,
            subscription: None,
            job: None,
        }
    }

    /// The tracked job's lifecycle state, `Idle` when none is tracked.
    pub fn state(&self) -> StreamState {
        self.job.as_ref().map(|j| j.state).unwrap_or(StreamState::Idle)
    }

    /// Create and persist the job record, mark processing and subscribe
    /// to the event channel. Any stream still open for a previous job is
    /// closed first (a new submission orphans the old reference).
    pub async fn open(&mut self, job_id: &str, mode: TransportMode) -> Result<()> {
        let job = Job::new(job_id, mode, self.time_provider.now_millis());
        self.job_store.set(&job).await?;
        info!(job_id = %job_id, mode = %mode, "Opened job stream");
        self.attach(job).await
    }

    /// If a persisted job exists (the client was restarted mid-job),
    /// reopen its stream as though it had just been submitted. A job
    /// that already completed server-side delivers its terminal marker
    /// as the first event after resubscription.
    pub async fn resume_if_pending(&mut self) -> Result<Option<JobId>> {
        match self.job_store.get().await? {
            Some(job) => {
                info!(job_id = %job.id, "Resuming pending job");
                let job_id = job.id.clone();
                self.attach(job).await?;
                Ok(Some(job_id))
            }
            None => Ok(None),
        }
    }

    async fn attach(&mut self, job: Job) -> Result<()> {
        if self.subscription.take().is_some() {
            debug!("Closed stream left over from a previous job");
        }
        self.processing.set(true);
        let job_id = job.id.clone();
        self.job = Some(job);
        self.subscription = Some(self.api.open_stream(&job_id).await?);
        Ok(())
    }

    /// Drain events in arrival order until a terminal signal or the end
    /// of the stream. Returns the terminal state reached, or `Open` when
    /// the channel closed without one (the persisted record is kept so a
    /// later resume can reattach).
    pub async fn follow(&mut self) -> Result<StreamState> {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return Ok(self.state());
            };
            match subscription.next().await {
                Ok(Some(line)) => {
                    if let Some(terminal) = self.handle_line(&line).await? {
                        return Ok(terminal);
                    }
                }
                Ok(None) => {
                    // Remote side closed without a terminal marker; keep
                    // the persisted record and processing flag so resume works
                    debug!("Event channel closed without terminal marker");
                    self.subscription = None;
                    return Ok(self.state());
                }
                Err(e) => {
                    warn!(error = %e, "Event channel interrupted");
                    self.subscription = None;
                    return Ok(self.state());
                }
            }
        }
    }

    /// Classify one line. Precedence: keep-alive, error, done, log text.
    async fn handle_line(&mut self, line: &str) -> Result<Option<StreamState>> {
        match classify(line) {
            StreamSignal::KeepAlive => Ok(None),
            StreamSignal::Failed => {
                self.sink.add(line, LogLevel::Error);
                self.finish(StreamState::Failed).await?;
                Ok(Some(StreamState::Failed))
            }
            StreamSignal::Completed => {
                self.sink.add("Workflow complete", LogLevel::Success);
                self.finish(StreamState::Done).await?;
                Ok(Some(StreamState::Done))
            }
            StreamSignal::Line => {
                self.sink.add(line, LogLevel::Info);
                Ok(None)
            }
        }
    }

    /// Terminal teardown: drive the tracked job through its guarded
    /// transition, close the subscription, reset processing and remove
    /// the persisted record. Atomic from the caller's point of view;
    /// calling it again is a safe no-op.
    pub async fn finish(&mut self, terminal: StreamState) -> Result<()> {
        if !terminal.is_terminal() {
            return Err(ClientError::Validation(format!(
                "{} is not a terminal stream state",
                terminal
            )));
        }
        let already_idle = self.job.is_none()
            && self.subscription.is_none()
            && self.job_store.get().await?.is_none();
        if already_idle {
            debug!("finish() on an already torn-down consumer");
            return Ok(());
        }
        // Taking the record makes the transition fire at most once; it is
        // destroyed with the teardown, returning the consumer to Idle.
        if let Some(mut job) = self.job.take() {
            let now = self.time_provider.now_millis();
            match terminal {
                StreamState::Failed => job.fail(now)?,
                StreamState::Cancelled => job.cancel(now)?,
                _ => job.complete(now)?,
            }
        }
        self.subscription = None;
        self.processing.set(false);
        self.job_store.clear().await?;
        info!(terminal = %terminal, "Job stream finished");
        Ok(())
    }

    /// Cancel the pending job, if any. Fire-and-forget: the cancellation
    /// response is not contract-checked; the authoritative termination is
    /// the local finish().
    pub async fn cancel(&mut self) -> Result<bool> {
        let Some(job) = self.job_store.get().await? else {
            return Ok(false);
        };
        if let Err(e) = self.api.cancel(&job.id).await {
            // Success or failure is not distinguished in the contract
            debug!(error = %e, "Cancellation request failed, finishing anyway");
        }
        self.sink.add("Cancelled", LogLevel::Warning);
        self.finish(StreamState::Cancelled).await?;
        Ok(true)
    }

    /// Teardown on shutdown: release the live connection WITHOUT touching
    /// the persisted record, so resume-on-restart keeps working.
    pub fn close(&mut self) {
        self.subscription = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::active_job_store::mocks::MemoryActiveJobStore;
    use crate::port::job_api::mocks::{MockJobApi, RecordedCall};
    use crate::port::time_provider::mocks::FixedTimeProvider;

    struct Harness {
        api: Arc<MockJobApi>,
        store: Arc<MemoryActiveJobStore>,
        sink: Arc<LogSink>,
        processing: ProcessingFlag,
        clock: Arc<FixedTimeProvider>,
        consumer: ProgressConsumer,
    }

    impl Harness {
        async fn pending_id(&self) -> Option<String> {
            self.store.get().await.unwrap().map(|j| j.id)
        }
    }

    fn harness(store: MemoryActiveJobStore) -> Harness {
        let api = Arc::new(MockJobApi::accepting("unused"));
        let store = Arc::new(store);
        let sink = Arc::new(LogSink::new());
        let processing = ProcessingFlag::new();
        let clock = Arc::new(FixedTimeProvider::new(1_000));
        let consumer = ProgressConsumer::new(
            api.clone(),
            store.clone(),
            sink.clone(),
            processing.clone(),
            clock.clone(),
        );
        Harness {
            api,
            store,
            sink,
            processing,
            clock,
            consumer,
        }
    }

    #[tokio::test]
    async fn test_ping_step_done_scenario() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[PING]", "step 1", "[DONE ALL]"]);

        h.consumer.open("abc123", TransportMode::Upload).await.unwrap();
        assert!(h.processing.is_processing());
        assert_eq!(h.pending_id().await.as_deref(), Some("abc123"));

        let outcome = h.consumer.follow().await.unwrap();
        assert_eq!(outcome, StreamState::Done);

        // Exactly two entries: the ping is silently discarded
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "step 1");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[1].message, "Workflow complete");
        assert_eq!(entries[1].level, LogLevel::Success);

        assert!(!h.processing.is_processing());
        assert!(h.pending_id().await.is_none());
    }

    #[tokio::test]
    async fn test_tracked_job_record_drives_lifecycle() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[DONE ALL]"]);

        assert_eq!(h.consumer.state(), StreamState::Idle);
        h.consumer.open("abc123", TransportMode::Reference).await.unwrap();
        assert_eq!(h.consumer.state(), StreamState::Open);

        // The persisted record carries the full job, not just the id
        let persisted = h.store.get().await.unwrap().unwrap();
        assert_eq!(persisted.id, "abc123");
        assert_eq!(persisted.mode, TransportMode::Reference);
        assert_eq!(persisted.opened_at, 1_000);

        h.clock.advance(500);
        let outcome = h.consumer.follow().await.unwrap();
        assert_eq!(outcome, StreamState::Done);
        // Destroyed on the terminal event, back to Idle
        assert_eq!(h.consumer.state(), StreamState::Idle);
        assert!(h.store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_rejects_non_terminal_target() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[PING]"]);
        h.consumer.open("j-1", TransportMode::Upload).await.unwrap();

        assert!(h.consumer.finish(StreamState::Open).await.is_err());
        assert!(h.consumer.finish(StreamState::Idle).await.is_err());
        // The rejected calls tore nothing down
        assert_eq!(h.consumer.state(), StreamState::Open);
        assert!(h.processing.is_processing());

        h.consumer.finish(StreamState::Done).await.unwrap();
        assert_eq!(h.consumer.state(), StreamState::Idle);
    }

    #[tokio::test]
    async fn test_error_line_terminates_as_failure() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api
            .script_stream(&["step 1", "[ERROR] tier2 failed", "late line"]);

        h.consumer.open("j-1", TransportMode::Upload).await.unwrap();
        let outcome = h.consumer.follow().await.unwrap();
        assert_eq!(outcome, StreamState::Failed);

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message, "[ERROR] tier2 failed");
        assert_eq!(entries[1].level, LogLevel::Error);
        // The line after the terminal marker was never consumed
        assert!(h.pending_id().await.is_none());
    }

    #[tokio::test]
    async fn test_error_beats_done_on_one_line() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[ERROR] broke [DONE ALL]"]);

        h.consumer.open("j-1", TransportMode::Upload).await.unwrap();
        let outcome = h.consumer.follow().await.unwrap();
        assert_eq!(outcome, StreamState::Failed);
        assert_eq!(h.sink.entries()[0].level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_keep_alives_never_logged_never_flip_state() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[PING]", "[PING]", "[PING]"]);

        h.consumer.open("j-1", TransportMode::Upload).await.unwrap();
        let outcome = h.consumer.follow().await.unwrap();

        // Stream ended without a terminal marker: still resumable
        assert_eq!(outcome, StreamState::Open);
        assert!(h.sink.is_empty());
        assert!(h.processing.is_processing());
        assert_eq!(h.pending_id().await.as_deref(), Some("j-1"));
    }

    #[tokio::test]
    async fn test_resume_replays_terminal_event_to_same_end_state() {
        // Simulated reload: a fresh consumer finds the persisted record
        // and the first replayed event is the terminal marker
        let mut h = harness(MemoryActiveJobStore::with_job(
            "j-42",
            TransportMode::Reference,
        ));
        h.api.script_stream(&["[DONE ALL]"]);

        let resumed = h.consumer.resume_if_pending().await.unwrap();
        assert_eq!(resumed.as_deref(), Some("j-42"));
        assert!(matches!(
            h.api.calls()[0],
            RecordedCall::OpenStream { ref job_id } if job_id == "j-42"
        ));

        let outcome = h.consumer.follow().await.unwrap();
        assert_eq!(outcome, StreamState::Done);

        // Same end state as a non-reloaded run: processing off, record
        // cleared, exactly one terminal log entry
        assert!(!h.processing.is_processing());
        assert!(h.pending_id().await.is_none());
        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Success);
    }

    #[tokio::test]
    async fn test_resume_without_pending_job_is_noop() {
        let mut h = harness(MemoryActiveJobStore::new());
        assert!(h.consumer.resume_if_pending().await.unwrap().is_none());
        assert_eq!(h.api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_finish_twice_is_safe() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[DONE ALL]"]);
        h.consumer.open("j-1", TransportMode::Upload).await.unwrap();
        h.consumer.follow().await.unwrap();

        let before = h.sink.len();
        // follow() already finished; two more explicit calls are no-ops
        h.consumer.finish(StreamState::Done).await.unwrap();
        h.consumer.finish(StreamState::Done).await.unwrap();
        assert_eq!(h.sink.len(), before);
        assert!(!h.processing.is_processing());
    }

    #[tokio::test]
    async fn test_cancel_without_pending_job() {
        let mut h = harness(MemoryActiveJobStore::new());
        assert!(!h.consumer.cancel().await.unwrap());
        // No request issued, no log entry produced
        assert_eq!(h.api.call_count(), 0);
        assert!(h.sink.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_posts_id_then_finishes() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[PING]"]);
        h.consumer.open("j-9", TransportMode::Upload).await.unwrap();

        assert!(h.consumer.cancel().await.unwrap());
        assert!(matches!(
            h.api.calls().last().unwrap(),
            RecordedCall::Cancel { job_id } if job_id == "j-9"
        ));

        let entries = h.sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Cancelled");
        assert_eq!(entries[0].level, LogLevel::Warning);
        assert!(!h.processing.is_processing());
        assert!(h.pending_id().await.is_none());
        assert_eq!(h.consumer.state(), StreamState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_from_fresh_process_without_open_stream() {
        // Cancellation only needs the persisted record, not a live stream
        let mut h = harness(MemoryActiveJobStore::with_job(
            "j-7",
            TransportMode::Upload,
        ));
        assert!(h.consumer.cancel().await.unwrap());
        assert!(h.pending_id().await.is_none());
        assert_eq!(h.sink.entries()[0].message, "Cancelled");
    }

    #[tokio::test]
    async fn test_teardown_keeps_persisted_record() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[PING]"]);
        h.consumer.open("j-1", TransportMode::Upload).await.unwrap();

        h.consumer.close();
        // The connection is gone but the record survives for resume
        assert_eq!(h.pending_id().await.as_deref(), Some("j-1"));
    }

    #[tokio::test]
    async fn test_new_submission_overwrites_previous_job() {
        let mut h = harness(MemoryActiveJobStore::new());
        h.api.script_stream(&["[PING]"]);

        h.consumer.open("old-job", TransportMode::Upload).await.unwrap();
        h.consumer.open("new-job", TransportMode::Upload).await.unwrap();
        assert_eq!(h.pending_id().await.as_deref(), Some("new-job"));
    }
}

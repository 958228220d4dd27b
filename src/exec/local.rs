//! In-process execution backend
//!
//! Runs conversion jobs on a semaphore-bounded pool of tokio tasks, with
//! the blocking encode call pushed onto blocking threads. Cancellation is
//! generation-based: each scope holds a cancel token; cancelling a scope
//! trips the current token and installs a fresh one, so jobs submitted
//! after the cancel are unaffected.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;

use super::{JobExecutionService, JobHandle, JobSpec, JobState, JobStatusEvent, JobTag, SubmitError};
use crate::core::FileId;
use crate::encoder::{output_path_for, EncodeRequest, Encoder};

/// Buffered status events per subscriber before lagging
const STATUS_EVENT_CAPACITY: usize = 1024;

/// Calculate the worker count based on CPU cores
///
/// Use 75% of cores, clamped between 2 and 8.
fn default_worker_count() -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    ((available as f32 * 0.75).ceil() as usize).clamp(2, 8)
}

struct Inner {
    encoder: Arc<dyn Encoder>,
    workers: Arc<Semaphore>,
    events: broadcast::Sender<JobStatusEvent>,
    /// Files with an outstanding job, per scope
    active: Mutex<HashMap<JobTag, HashSet<FileId>>>,
    /// Current cancellation token, per scope
    cancel_tokens: Mutex<HashMap<JobTag, Arc<AtomicBool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Inner {
    fn emit(&self, event: JobStatusEvent) {
        // No subscribers is fine; events are best-effort notifications
        let _ = self.events.send(event);
    }

    fn finish(&self, spec: &JobSpec, state: JobState, error: Option<String>) {
        {
            let mut active = self.active.lock().unwrap();
            if let Some(set) = active.get_mut(&spec.scope) {
                set.remove(&spec.file);
            }
        }
        let mut event = JobStatusEvent::new(spec.file.clone(), state);
        event.error = error;
        self.emit(event);
    }

    fn cancel_token(&self, scope: &JobTag) -> Arc<AtomicBool> {
        let mut tokens = self.cancel_tokens.lock().unwrap();
        tokens
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }
}

/// Job execution backed by an in-process worker pool
#[derive(Clone)]
pub struct LocalExecutionService {
    inner: Arc<Inner>,
}

impl LocalExecutionService {
    /// Create a service with a CPU-derived worker count
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self::with_workers(encoder, default_worker_count())
    }

    pub fn with_workers(encoder: Arc<dyn Encoder>, workers: usize) -> Self {
        let (events, _) = broadcast::channel(STATUS_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                encoder,
                workers: Arc::new(Semaphore::new(workers.max(1))),
                events,
                active: Mutex::new(HashMap::new()),
                cancel_tokens: Mutex::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Stop accepting submissions; jobs already submitted keep running
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Wait for every spawned job task to finish
    pub async fn wait_idle(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.inner.tasks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                log::warn!("Job task ended abnormally: {}", e);
            }
        }
    }
}

async fn run_job(inner: Arc<Inner>, spec: JobSpec, cancel: Arc<AtomicBool>) {
    if cancel.load(Ordering::SeqCst) {
        inner.finish(&spec, JobState::Cancelled, None);
        return;
    }

    let permit = match inner.workers.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            inner.finish(&spec, JobState::Cancelled, None);
            return;
        }
    };

    if cancel.load(Ordering::SeqCst) {
        inner.finish(&spec, JobState::Cancelled, None);
        return;
    }

    inner.emit(JobStatusEvent::new(spec.file.clone(), JobState::Running));

    let encoder = inner.encoder.clone();
    let request = EncodeRequest {
        source: spec.source.clone(),
        output: output_path_for(&spec.source, &spec.policy.destination),
    };
    let delete_original = spec.policy.delete_original;
    let source = spec.source.clone();

    let result = tokio::task::spawn_blocking(move || {
        let outcome = encoder.encode(&request);
        if outcome.is_ok() && delete_original {
            if let Err(e) = std::fs::remove_file(&source) {
                log::warn!("Failed to delete original {}: {}", source.display(), e);
            }
        }
        outcome
    })
    .await;

    drop(permit);

    match result {
        Ok(Ok(())) => inner.finish(&spec, JobState::Succeeded, None),
        Ok(Err(error)) => {
            if cancel.load(Ordering::SeqCst) {
                inner.finish(&spec, JobState::Cancelled, None);
            } else {
                log::warn!("Encoding failed for {}: {}", spec.source.display(), error);
                inner.finish(&spec, JobState::Failed, Some(error));
            }
        }
        Err(e) => {
            inner.finish(
                &spec,
                JobState::Failed,
                Some(format!("Encode task panicked: {}", e)),
            );
        }
    }
}

impl JobExecutionService for LocalExecutionService {
    fn submit(&self, spec: JobSpec) -> Result<JobHandle, SubmitError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SubmitError::Unavailable("service is shut down".into()));
        }

        {
            let mut active = self.inner.active.lock().unwrap();
            let set = active.entry(spec.scope.clone()).or_default();
            if !set.insert(spec.file.clone()) {
                // Unique-submission: the file already has an outstanding job
                log::debug!("Duplicate submission ignored for {}", spec.file);
                return Ok(JobHandle::new(spec.file.clone()));
            }
        }

        let cancel = self.inner.cancel_token(&spec.scope);
        let handle = JobHandle::new(spec.file.clone());

        self.inner
            .emit(JobStatusEvent::new(spec.file.clone(), JobState::Queued));

        let task = tokio::spawn(run_job(self.inner.clone(), spec, cancel));

        let mut tasks = self.inner.tasks.lock().unwrap();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);

        Ok(handle)
    }

    fn status_events(&self) -> broadcast::Receiver<JobStatusEvent> {
        self.inner.events.subscribe()
    }

    fn active_count(&self, scope: &JobTag) -> usize {
        self.inner
            .active
            .lock()
            .unwrap()
            .get(scope)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    fn cancel_by_tag(&self, scope: &JobTag) {
        {
            let mut tokens = self.inner.cancel_tokens.lock().unwrap();
            if let Some(token) = tokens.get(scope) {
                token.store(true, Ordering::SeqCst);
            }
            // Fresh generation for anything submitted after this cancel
            tokens.insert(scope.clone(), Arc::new(AtomicBool::new(false)));
        }
        self.inner.encoder.abort_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConversionPolicy;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Encoder that records calls and fails files on request
    struct StubEncoder {
        delay: Duration,
        fail_stems: Vec<String>,
        calls: Mutex<Vec<PathBuf>>,
        aborts: AtomicUsize,
    }

    impl StubEncoder {
        fn new() -> Self {
            Self::with_delay(Duration::from_millis(0))
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                fail_stems: Vec::new(),
                calls: Mutex::new(Vec::new()),
                aborts: AtomicUsize::new(0),
            }
        }

        fn failing(stems: &[&str]) -> Self {
            Self {
                delay: Duration::from_millis(0),
                fail_stems: stems.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
                aborts: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Encoder for StubEncoder {
        fn encode(&self, request: &EncodeRequest) -> Result<(), String> {
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.calls.lock().unwrap().push(request.source.clone());

            let stem = request
                .source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            if self.fail_stems.iter().any(|f| f == stem) {
                Err(format!("stub failure for {}", stem))
            } else {
                Ok(())
            }
        }

        fn abort_in_flight(&self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spec_for(path: &str, scope: &JobTag) -> JobSpec {
        JobSpec {
            file: FileId::from_path(Path::new(path)),
            source: PathBuf::from(path),
            policy: ConversionPolicy::default(),
            scope: scope.clone(),
        }
    }

    fn drain(rx: &mut broadcast::Receiver<JobStatusEvent>) -> Vec<JobStatusEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_submit_emits_lifecycle_events() {
        let encoder = Arc::new(StubEncoder::new());
        let service = LocalExecutionService::with_workers(encoder.clone(), 2);
        let scope = JobTag::new("test");
        let mut rx = service.status_events();

        service.submit(spec_for("/fake/a.flac", &scope)).unwrap();
        service.wait_idle().await;

        let events = drain(&mut rx);
        let states: Vec<JobState> = events.iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![JobState::Queued, JobState::Running, JobState::Succeeded]
        );
        assert_eq!(service.active_count(&scope), 0);
        assert_eq!(encoder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_noop() {
        let encoder = Arc::new(StubEncoder::with_delay(Duration::from_millis(50)));
        let service = LocalExecutionService::with_workers(encoder.clone(), 2);
        let scope = JobTag::new("test");

        service.submit(spec_for("/fake/a.flac", &scope)).unwrap();
        service.submit(spec_for("/fake/a.flac", &scope)).unwrap();
        assert_eq!(service.active_count(&scope), 1);

        service.wait_idle().await;
        assert_eq!(encoder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_emits_failed_event() {
        let encoder = Arc::new(StubEncoder::failing(&["bad"]));
        let service = LocalExecutionService::with_workers(encoder, 2);
        let scope = JobTag::new("test");
        let mut rx = service.status_events();

        service.submit(spec_for("/fake/bad.flac", &scope)).unwrap();
        service.wait_idle().await;

        let events = drain(&mut rx);
        let failed = events
            .iter()
            .find(|e| e.state == JobState::Failed)
            .expect("expected a Failed event");
        assert!(failed.error.as_ref().unwrap().contains("stub failure"));
        assert_eq!(service.active_count(&scope), 0);
    }

    #[tokio::test]
    async fn test_cancel_by_tag_skips_queued_jobs() {
        // One worker: the first (slow) job occupies it, the second queues
        let encoder = Arc::new(StubEncoder::with_delay(Duration::from_millis(100)));
        let service = LocalExecutionService::with_workers(encoder.clone(), 1);
        let scope = JobTag::new("test");
        let mut rx = service.status_events();

        service.submit(spec_for("/fake/a.flac", &scope)).unwrap();
        service.submit(spec_for("/fake/b.flac", &scope)).unwrap();

        // Give the first job time to grab the worker, then cancel
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.cancel_by_tag(&scope);
        service.wait_idle().await;

        // The queued job never reached the encoder
        assert_eq!(encoder.call_count(), 1);
        assert_eq!(encoder.aborts.load(Ordering::SeqCst), 1);

        let b = FileId::from_path(Path::new("/fake/b.flac"));
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| e.file == b && e.state == JobState::Cancelled));
        assert_eq!(service.active_count(&scope), 0);
    }

    #[tokio::test]
    async fn test_submission_after_cancel_runs_normally() {
        let encoder = Arc::new(StubEncoder::new());
        let service = LocalExecutionService::with_workers(encoder.clone(), 2);
        let scope = JobTag::new("test");

        service.cancel_by_tag(&scope);
        service.submit(spec_for("/fake/a.flac", &scope)).unwrap();
        service.wait_idle().await;

        // The cancel was for a previous generation
        assert_eq!(encoder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_service_rejects_submissions() {
        let encoder = Arc::new(StubEncoder::new());
        let service = LocalExecutionService::with_workers(encoder, 2);
        let scope = JobTag::new("test");

        service.shutdown();
        let result = service.submit(spec_for("/fake/a.flac", &scope));
        assert!(matches!(result, Err(SubmitError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_active_count_is_scope_local() {
        let encoder = Arc::new(StubEncoder::with_delay(Duration::from_millis(50)));
        let service = LocalExecutionService::with_workers(encoder, 4);
        let scope_a = JobTag::new("a");
        let scope_b = JobTag::new("b");

        service.submit(spec_for("/fake/a.flac", &scope_a)).unwrap();
        assert_eq!(service.active_count(&scope_a), 1);
        assert_eq!(service.active_count(&scope_b), 0);

        service.wait_idle().await;
        assert_eq!(service.active_count(&scope_a), 0);
    }
}

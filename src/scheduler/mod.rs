//! Batch conversion scheduling
//!
//! This module contains:
//! - The in-flight dedup tracker (one outstanding job per file, ever)
//! - The batch coordinator (bounded, paced, cancellable submission)
//! - The state reconciler (status stream -> coalesced snapshot)
//! - The `ConversionScheduler` facade tying them together
//!
//! The scheduler owns no filesystem or media logic; it orchestrates an
//! injected `JobExecutionService` and publishes `ConversionSnapshot`s.

mod batch;
mod coordinator;
mod reconciler;
mod tracker;

pub use batch::{BatchPhase, BatchSnapshot, ConversionSnapshot, FileProgress};
pub use tracker::InFlightTracker;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::{CandidateFile, ConversionPolicy, FileId};
use crate::exec::{ExecutionAdapter, JobExecutionService, JobTag};
use batch::BatchState;
use coordinator::BatchCoordinator;
use reconciler::StateReconciler;

/// Tuning knobs for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum jobs outstanding at once
    pub max_concurrent: usize,
    /// Backoff while the backend is at the ceiling
    pub poll_interval: Duration,
    /// Submissions between pacing pauses
    pub submit_chunk: usize,
    /// Pause between submission chunks
    pub pacing_delay: Duration,
    /// Minimum interval between published snapshots
    pub debounce: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            poll_interval: Duration::from_millis(200),
            submit_chunk: 10,
            pacing_delay: Duration::from_millis(50),
            debounce: Duration::from_millis(100),
        }
    }
}

/// Starting a batch failed
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("a batch run is already active")]
    RunInProgress,
}

/// State shared between the facade, coordinator, and reconciler
pub(crate) struct SchedulerShared {
    pub(crate) tracker: InFlightTracker,
    pub(crate) batch: Mutex<BatchState>,
    pub(crate) files: Mutex<HashMap<FileId, FileProgress>>,
    pub(crate) last_error: Mutex<Option<String>>,
    snapshot_tx: watch::Sender<ConversionSnapshot>,
    dirty: AtomicBool,
}

impl SchedulerShared {
    fn new() -> (Arc<Self>, watch::Receiver<ConversionSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(ConversionSnapshot::empty());
        let shared = Arc::new(Self {
            tracker: InFlightTracker::new(),
            batch: Mutex::new(BatchState::new()),
            files: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
            snapshot_tx,
            dirty: AtomicBool::new(false),
        });
        (shared, snapshot_rx)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Record that a file's job was just submitted
    pub(crate) fn mark_submitted(&self, id: &FileId) {
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(id.clone()).or_default();
        entry.converting = true;
        entry.progress = 0.0;
        drop(files);
        self.mark_dirty();
    }

    /// Publish a snapshot if anything changed since the last one
    pub(crate) fn publish_if_dirty(&self) {
        if self.dirty.swap(false, Ordering::SeqCst) {
            self.publish_now();
        }
    }

    /// Publish unconditionally (used for caller-visible transitions)
    pub(crate) fn publish(&self) {
        self.dirty.store(false, Ordering::SeqCst);
        self.publish_now();
    }

    fn publish_now(&self) {
        let files = self.files.lock().unwrap().clone();
        let batch = self.batch.lock().unwrap().snapshot();
        let last_error = self.last_error.lock().unwrap().clone();
        let snapshot = ConversionSnapshot {
            files,
            batch,
            last_error,
            updated_at: chrono::Utc::now(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

/// Public entry point for scheduling conversions
///
/// Must be created inside a tokio runtime: construction spawns the
/// reconciler task, and batch submission spawns a coordinator task per run.
pub struct ConversionScheduler {
    shared: Arc<SchedulerShared>,
    adapter: Arc<ExecutionAdapter>,
    config: SchedulerConfig,
    snapshot_rx: watch::Receiver<ConversionSnapshot>,
    /// Cancel flag of the current (or last) batch run
    run_cancel: Mutex<Arc<AtomicBool>>,
    reconciler: JoinHandle<()>,
}

impl ConversionScheduler {
    pub fn new(service: Arc<dyn JobExecutionService>, config: SchedulerConfig) -> Self {
        let scope = JobTag::unique("convert");
        let adapter = Arc::new(ExecutionAdapter::new(service, scope));
        let (shared, snapshot_rx) = SchedulerShared::new();

        // Subscribe before anything can be submitted so no event is missed
        let events = adapter.status_events();
        let reconciler = tokio::spawn(
            StateReconciler::new(shared.clone(), events, config.debounce).run(),
        );

        Self {
            shared,
            adapter,
            config,
            snapshot_rx,
            run_cancel: Mutex::new(Arc::new(AtomicBool::new(false))),
            reconciler,
        }
    }

    /// The subset of a selection that would actually be converted
    ///
    /// Callers presenting a confirmation must count this, not the raw
    /// selection: a selected file may already be the target format, already
    /// converted this session, or already in flight.
    pub fn pending_in(&self, selection: &[CandidateFile]) -> Vec<FileId> {
        let files = self.shared.files.lock().unwrap();
        let mut seen = HashSet::new();
        selection
            .iter()
            .filter(|c| {
                c.needs_conversion
                    && !files.get(&c.id).map(|f| f.converted).unwrap_or(false)
                    && !self.shared.tracker.contains(&c.id)
                    && seen.insert(c.id.clone())
            })
            .map(|c| c.id.clone())
            .collect()
    }

    /// Convert a single file; returns false if nothing was submitted
    ///
    /// Calling this twice in quick succession for the same file submits
    /// exactly one job. Runs alongside an active batch without joining its
    /// aggregates.
    pub fn convert_one(&self, file: &CandidateFile, policy: &ConversionPolicy) -> bool {
        if !file.needs_conversion {
            return false;
        }
        {
            let files = self.shared.files.lock().unwrap();
            if files.get(&file.id).map(|f| f.converted).unwrap_or(false) {
                return false;
            }
        }
        if !self.shared.tracker.try_reserve(&file.id) {
            return false;
        }

        match self.adapter.submit(file, policy) {
            Ok(_) => {
                self.shared.mark_submitted(&file.id);
                true
            }
            Err(e) => {
                self.shared.tracker.release(&file.id);
                log::warn!("Submission failed for {}: {}", file.path.display(), e);
                {
                    let mut files = self.shared.files.lock().unwrap();
                    files.entry(file.id.clone()).or_default().error = Some(e.to_string());
                }
                *self.shared.last_error.lock().unwrap() = Some(e.to_string());
                self.shared.mark_dirty();
                false
            }
        }
    }

    /// Start a batch over the selection; returns the filtered count
    ///
    /// `Ok(0)` means nothing needed converting and no run was started.
    /// Fails with `RunInProgress` while a batch is active; it never merges
    /// into or replaces a running batch.
    pub fn convert_batch(
        &self,
        selection: &[CandidateFile],
        policy: &ConversionPolicy,
    ) -> Result<usize, BatchError> {
        let mut pending: HashSet<FileId> = self.pending_in(selection).into_iter().collect();
        let files: Vec<CandidateFile> = selection
            .iter()
            .filter(|c| pending.remove(&c.id))
            .cloned()
            .collect();

        if files.is_empty() {
            log::debug!("Batch request filtered down to nothing; not starting");
            return Ok(0);
        }

        {
            let mut batch = self.shared.batch.lock().unwrap();
            if batch.is_active() {
                return Err(BatchError::RunInProgress);
            }
            batch.begin(files.iter().map(|f| f.id.clone()));
        }

        let cancel = Arc::new(AtomicBool::new(false));
        *self.run_cancel.lock().unwrap() = cancel.clone();

        let total = files.len();
        log::info!("Starting batch: {} of {} selected files", total, selection.len());
        self.shared.publish();

        let coordinator = BatchCoordinator::new(
            self.shared.clone(),
            self.adapter.clone(),
            cancel,
            self.config.clone(),
        );
        tokio::spawn(coordinator.run(files, policy.clone()));

        Ok(total)
    }

    /// Cancel everything: the submission loop, local bookkeeping, and
    /// (best-effort) the backend's jobs
    ///
    /// Local state is reset synchronously; the backend's acknowledgement is
    /// not awaited. Status events for jobs that were in flight arrive later
    /// and are dropped as strays.
    pub fn cancel_all(&self) {
        log::info!("Cancelling all conversions");
        self.run_cancel.lock().unwrap().store(true, Ordering::SeqCst);

        self.shared.batch.lock().unwrap().reset_cancelled();
        self.shared.tracker.clear();
        {
            let mut files = self.shared.files.lock().unwrap();
            for progress in files.values_mut() {
                if progress.converting {
                    progress.converting = false;
                    progress.progress = 0.0;
                }
            }
        }

        self.adapter.cancel_all();
        self.shared.publish();
    }

    /// Latest coalesced projection
    pub fn current_snapshot(&self) -> ConversionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch snapshots as they are published
    pub fn subscribe(&self) -> watch::Receiver<ConversionSnapshot> {
        self.snapshot_rx.clone()
    }
}

impl Drop for ConversionScheduler {
    fn drop(&mut self) {
        self.reconciler.abort();
    }
}

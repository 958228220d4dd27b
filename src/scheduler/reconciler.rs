//! Status-event reconciliation
//!
//! Turns the raw status stream into the published snapshot. Events mutate
//! state as they arrive; snapshots go out at most once per debounce tick,
//! so consumers see a bounded update rate no matter how large the batch is.
//!
//! Terminal events take effect only when the file was still reserved in the
//! tracker. That single membership test is what makes duplicate deliveries,
//! out-of-order terminals, and post-cancellation strays all no-ops.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::batch::BatchPhase;
use super::SchedulerShared;
use crate::exec::{JobState, JobStatusEvent};

pub(crate) struct StateReconciler {
    shared: Arc<SchedulerShared>,
    events: broadcast::Receiver<JobStatusEvent>,
    debounce: Duration,
}

impl StateReconciler {
    pub(crate) fn new(
        shared: Arc<SchedulerShared>,
        events: broadcast::Receiver<JobStatusEvent>,
        debounce: Duration,
    ) -> Self {
        Self {
            shared,
            events,
            debounce,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.debounce);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Ok(event) => self.apply(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("Status stream lagged, {} events dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => {
                    self.check_completion();
                    self.shared.publish_if_dirty();
                }
            }
        }

        // Stream closed: flush whatever is pending
        self.check_completion();
        self.shared.publish_if_dirty();
    }

    fn apply(&self, event: &JobStatusEvent) {
        match event.state {
            JobState::Queued | JobState::Running => {
                // Progress only; structural changes come from terminal events
                if self.shared.tracker.contains(&event.file) {
                    let mut files = self.shared.files.lock().unwrap();
                    let entry = files.entry(event.file.clone()).or_default();
                    entry.converting = true;
                    entry.progress = event.progress;
                    drop(files);
                    self.shared.mark_dirty();
                }
            }
            JobState::Succeeded => {
                if !self.shared.tracker.release(&event.file) {
                    log::debug!("Dropping stray terminal event for {}", event.file);
                    return;
                }
                {
                    let mut files = self.shared.files.lock().unwrap();
                    let entry = files.entry(event.file.clone()).or_default();
                    entry.converting = false;
                    entry.converted = true;
                    entry.progress = 1.0;
                    entry.error = None;
                }
                {
                    let mut batch = self.shared.batch.lock().unwrap();
                    if batch.active_files.remove(&event.file) {
                        batch.completed += 1;
                    }
                }
                self.shared.mark_dirty();
            }
            JobState::Failed => {
                if !self.shared.tracker.release(&event.file) {
                    log::debug!("Dropping stray terminal event for {}", event.file);
                    return;
                }
                let error = event
                    .error
                    .clone()
                    .unwrap_or_else(|| "conversion failed".to_string());
                {
                    let mut files = self.shared.files.lock().unwrap();
                    let entry = files.entry(event.file.clone()).or_default();
                    entry.converting = false;
                    entry.progress = 0.0;
                    entry.error = Some(error.clone());
                }
                {
                    // A failed file does not fail the run
                    let mut batch = self.shared.batch.lock().unwrap();
                    if batch.active_files.remove(&event.file) {
                        batch.failed += 1;
                        batch.had_errors = true;
                    }
                }
                *self.shared.last_error.lock().unwrap() = Some(error);
                self.shared.mark_dirty();
            }
            JobState::Cancelled => {
                if !self.shared.tracker.release(&event.file) {
                    return;
                }
                {
                    let mut files = self.shared.files.lock().unwrap();
                    let entry = files.entry(event.file.clone()).or_default();
                    entry.converting = false;
                    entry.progress = 0.0;
                }
                {
                    let mut batch = self.shared.batch.lock().unwrap();
                    batch.active_files.remove(&event.file);
                }
                self.shared.mark_dirty();
            }
        }
    }

    /// Completion is declared here, not in the coordinator: submission order
    /// finishing says nothing about job completion
    fn check_completion(&self) {
        let mut batch = self.shared.batch.lock().unwrap();
        if batch.is_active() && batch.submission_done && batch.active_files.is_empty() {
            batch.phase = BatchPhase::Completed;
            log::info!(
                "Batch complete: {} converted, {} failed",
                batch.completed,
                batch.failed
            );
            drop(batch);
            self.shared.mark_dirty();
        }
    }
}

//! Batch submission loop
//!
//! Drives one batch run: admits jobs against the backend's concurrency
//! ceiling, paces submissions so the backend and the snapshot stream can
//! absorb them, and stops between files when cancelled. The coordinator
//! never declares the batch complete; that is the reconciler's call once
//! every submitted job has reached a terminal state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{SchedulerConfig, SchedulerShared};
use crate::core::{CandidateFile, ConversionPolicy, FileId};
use crate::exec::ExecutionAdapter;

pub(crate) struct BatchCoordinator {
    shared: Arc<SchedulerShared>,
    adapter: Arc<ExecutionAdapter>,
    cancel: Arc<AtomicBool>,
    config: SchedulerConfig,
}

impl BatchCoordinator {
    pub(crate) fn new(
        shared: Arc<SchedulerShared>,
        adapter: Arc<ExecutionAdapter>,
        cancel: Arc<AtomicBool>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            shared,
            adapter,
            cancel,
            config,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Submit the filtered selection, in input order
    pub(crate) async fn run(self, files: Vec<CandidateFile>, policy: ConversionPolicy) {
        log::info!("Batch submission started: {} files", files.len());
        let mut submitted = 0usize;

        for file in files {
            // Admission control: the backend count is eventually consistent,
            // so this is a backoff loop rather than an exact gate
            loop {
                if self.is_cancelled() {
                    log::info!("Batch cancelled after {} submissions", submitted);
                    return;
                }
                if self.adapter.active_count() < self.config.max_concurrent {
                    break;
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }

            if self.is_cancelled() {
                log::info!("Batch cancelled after {} submissions", submitted);
                return;
            }

            // Lost the reservation race to another submitter: skip
            if !self.shared.tracker.try_reserve(&file.id) {
                continue;
            }

            match self.adapter.submit(&file, &policy) {
                Ok(_) => {
                    submitted += 1;
                    self.shared.mark_submitted(&file.id);

                    // Pace the backend between chunks
                    if submitted % self.config.submit_chunk == 0 {
                        tokio::time::sleep(self.config.pacing_delay).await;
                    }
                }
                Err(e) => {
                    // Backend unreachable for this item; drop the reservation
                    // and keep going with the rest
                    self.shared.tracker.release(&file.id);
                    log::warn!("Submission failed for {}: {}", file.path.display(), e);
                    self.record_submit_failure(&file.id, e.to_string());
                }
            }
        }

        self.finish_submission(submitted);
    }

    fn finish_submission(&self, submitted: usize) {
        log::info!("Batch submission finished: {} files submitted", submitted);
        let mut batch = self.shared.batch.lock().unwrap();
        batch.submission_done = true;
        drop(batch);
        self.shared.mark_dirty();
    }

    fn record_submit_failure(&self, id: &FileId, error: String) {
        {
            let mut files = self.shared.files.lock().unwrap();
            let entry = files.entry(id.clone()).or_default();
            entry.converting = false;
            entry.error = Some(error.clone());
        }
        {
            let mut batch = self.shared.batch.lock().unwrap();
            if batch.active_files.remove(id) {
                batch.failed += 1;
                batch.had_errors = true;
            }
        }
        *self.shared.last_error.lock().unwrap() = Some(error);
        self.shared.mark_dirty();
    }
}

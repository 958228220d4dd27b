//! Batch run state and the published snapshot types
//!
//! `BatchState` is the aggregate view of one batch run. It is created when a
//! batch starts, mutated by the reconciler as terminal events land, and
//! hard-reset by cancellation. `ConversionSnapshot` is the coalesced,
//! immutable projection handed to consumers.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::core::FileId;

/// Phase of the current (or last) batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPhase {
    /// No batch has run yet, or the last one was reset
    #[default]
    Idle,
    /// Submission and/or conversion in progress
    Running,
    /// Every submitted job reached a terminal state
    Completed,
    /// The run was cancelled by the caller
    Cancelled,
}

/// Aggregate state of one batch run
#[derive(Debug, Default)]
pub struct BatchState {
    pub phase: BatchPhase,
    /// Size of the filtered selection at batch start
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Members of this run that have not reached a terminal state
    pub active_files: HashSet<FileId>,
    /// Set once the coordinator's submission loop ends
    pub submission_done: bool,
    pub had_errors: bool,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.phase == BatchPhase::Running
    }

    /// Start a run over the given target set
    pub fn begin(&mut self, targets: impl IntoIterator<Item = FileId>) {
        self.active_files = targets.into_iter().collect();
        self.total = self.active_files.len();
        self.completed = 0;
        self.failed = 0;
        self.submission_done = false;
        self.had_errors = false;
        self.phase = BatchPhase::Running;
    }

    /// Hard reset on cancellation: empty and inactive
    pub fn reset_cancelled(&mut self) {
        self.active_files.clear();
        self.submission_done = true;
        self.phase = BatchPhase::Cancelled;
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            phase: self.phase,
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            active: self.active_files.len(),
            is_active: self.is_active(),
            had_errors: self.had_errors,
        }
    }
}

/// Batch aggregates as published in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSnapshot {
    pub phase: BatchPhase,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Run members still in flight
    pub active: usize,
    pub is_active: bool,
    pub had_errors: bool,
}

/// Published per-file conversion state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileProgress {
    /// An outstanding job exists for this file
    pub converting: bool,
    /// Fraction complete, 0.0..=1.0
    pub progress: f32,
    /// The file reached the target format this session
    pub converted: bool,
    /// Last conversion error, kept until the file converts
    pub error: Option<String>,
}

/// Coalesced projection of the whole scheduler state
#[derive(Debug, Clone)]
pub struct ConversionSnapshot {
    pub files: HashMap<FileId, FileProgress>,
    pub batch: BatchSnapshot,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ConversionSnapshot {
    pub fn empty() -> Self {
        Self {
            files: HashMap::new(),
            batch: BatchSnapshot::default(),
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// True if any file currently has an outstanding job
    pub fn any_converting(&self) -> bool {
        self.files.values().any(|f| f.converting)
    }
}

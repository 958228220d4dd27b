//! Job execution service abstraction
//!
//! The scheduler never talks to a worker pool directly; it submits
//! `JobSpec`s to a `JobExecutionService` and observes a broadcast stream of
//! `JobStatusEvent`s. The stream is multi-subscriber and makes no ordering
//! promise across files; per file, `Running` precedes the terminal state
//! and duplicate or stray terminal events are possible, so consumers must
//! process them idempotently.

mod adapter;
mod local;

pub use adapter::ExecutionAdapter;
pub use local::LocalExecutionService;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::core::{ConversionPolicy, FileId};

/// Scope tag grouping jobs for cancellation and admission counting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobTag(pub String);

impl JobTag {
    pub fn new(tag: impl Into<String>) -> Self {
        JobTag(tag.into())
    }

    /// A tag no other scheduler instance shares
    pub fn unique(prefix: &str) -> Self {
        JobTag(format!("{}-{}", prefix, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }
}

/// A conversion request as submitted to the backend
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub file: FileId,
    pub source: PathBuf,
    pub policy: ConversionPolicy,
    pub scope: JobTag,
}

/// Handle returned by a submission
///
/// Identifies the submission request; job status travels through the event
/// stream keyed by file id, not through the handle.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub file: FileId,
}

impl JobHandle {
    pub fn new(file: FileId) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            file,
        }
    }
}

/// One observed status change for a job
#[derive(Debug, Clone)]
pub struct JobStatusEvent {
    pub file: FileId,
    pub state: JobState,
    /// Fraction complete, 0.0..=1.0
    pub progress: f32,
    pub error: Option<String>,
}

impl JobStatusEvent {
    pub fn new(file: FileId, state: JobState) -> Self {
        let progress = match state {
            JobState::Succeeded => 1.0,
            _ => 0.0,
        };
        Self {
            file,
            state,
            progress,
            error: None,
        }
    }

    pub fn failed(file: FileId, error: impl Into<String>) -> Self {
        Self {
            file,
            state: JobState::Failed,
            progress: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Submission failed before a job existed
///
/// Distinct from a job failing: job failures are reported asynchronously
/// through the status stream.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("execution backend unavailable: {0}")]
    Unavailable(String),
}

/// An external system that runs conversion jobs
///
/// Implementations must support idempotent unique-submission keyed by file
/// identity: submitting a file that already has an outstanding job under the
/// same scope starts nothing and is not an error. `active_count` is an
/// eventually consistent admission signal, not ground truth. `cancel_by_tag`
/// is fire-and-forget; outcomes arrive through the status stream.
pub trait JobExecutionService: Send + Sync {
    fn submit(&self, spec: JobSpec) -> Result<JobHandle, SubmitError>;

    fn status_events(&self) -> broadcast::Receiver<JobStatusEvent>;

    fn active_count(&self, scope: &JobTag) -> usize;

    fn cancel_by_tag(&self, scope: &JobTag);
}

//! Execution adapter
//!
//! Thin translation layer between the scheduler and the job execution
//! service: builds specs, owns the scope tag, forwards status streams and
//! cancellation. No business logic lives here.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::{JobExecutionService, JobHandle, JobSpec, JobStatusEvent, JobTag, SubmitError};
use crate::core::{CandidateFile, ConversionPolicy};

/// Adapter binding a scheduler to one scope on an execution service
pub struct ExecutionAdapter {
    service: Arc<dyn JobExecutionService>,
    scope: JobTag,
}

impl ExecutionAdapter {
    pub fn new(service: Arc<dyn JobExecutionService>, scope: JobTag) -> Self {
        Self { service, scope }
    }

    pub fn scope(&self) -> &JobTag {
        &self.scope
    }

    /// Submit one candidate under this adapter's scope
    pub fn submit(
        &self,
        file: &CandidateFile,
        policy: &ConversionPolicy,
    ) -> Result<JobHandle, SubmitError> {
        self.service.submit(JobSpec {
            file: file.id.clone(),
            source: file.path.clone(),
            policy: policy.clone(),
            scope: self.scope.clone(),
        })
    }

    pub fn status_events(&self) -> broadcast::Receiver<JobStatusEvent> {
        self.service.status_events()
    }

    /// Outstanding jobs under this scope, as reported by the backend
    pub fn active_count(&self) -> usize {
        self.service.active_count(&self.scope)
    }

    /// Request cancellation of every job under this scope
    ///
    /// Fire-and-forget: outcomes arrive through the status stream.
    pub fn cancel_all(&self) {
        self.service.cancel_by_tag(&self.scope);
    }
}

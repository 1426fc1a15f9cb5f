use careflow_common::prelude::*;
use serde_json::Value;

use super::JobState;

/// A remote runner that executes long jobs (robots, batch scorers) on request.
pub trait RemoteJobClient {
    /// Starts one run of `job_definition_id` and returns the runner's job id.
    fn start(&self, job_definition_id: &str, payload: &Value) -> CareResult<InlineStr>;

    /// Current status of a started job, with whatever payload the runner attaches.
    fn status(&self, job_id: &str) -> CareResult<RemoteJobStatus>;
}

/// One status answer of a remote runner, still in the runner's vocabulary.
#[derive(Clone, Debug)]
pub struct RemoteJobStatus {
    pub status: InlineStr,
    pub payload: Value,
    pub error_message: Option<InlineStr>,
}

impl RemoteJobStatus {
    pub fn new(status: impl Into<InlineStr>, payload: Value) -> Self {
        Self {
            status: status.into(),
            payload,
            error_message: None,
        }
    }

    pub fn with_error(mut self, error_message: impl Into<InlineStr>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }
}

/// A job started on a remote runner. Once terminal, its state never changes again.
#[derive(Clone, Debug)]
pub struct ExternalJob {
    pub job_id: InlineStr,
    pub job_definition_id: InlineStr,
    pub payload: Value,
    /// Epoch millis when the runner accepted the job.
    pub started_at: i64,
    state: JobState,
}

impl ExternalJob {
    pub fn new(
        job_id: InlineStr,
        job_definition_id: InlineStr,
        payload: Value,
        started_at: i64,
    ) -> Self {
        Self {
            job_id,
            job_definition_id,
            payload,
            started_at,
            state: JobState::Running,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Moves a running job to `state`. A terminal job keeps its state.
    pub(crate) fn transition(&mut self, state: JobState) -> JobState {
        if !self.state.is_terminal() {
            self.state = state;
        }
        self.state
    }
}

use careflow_common::prelude::*;
use serde_json::Value;

use super::{ExternalJob, JobState, RemoteJobClient, ResultExtractor, StatusMapper};
use crate::config::JobPollerProperties;
use crate::lease::LeaseKeeper;
use crate::metrics::Monitors;
use crate::utils::SharedClock;

/// How the wait for one remote job ended.
#[derive(Clone, Debug)]
pub struct JobOutcome {
    pub state: JobState,
    /// Runner error message on `Failed`, budget description on `TimedOut`.
    pub message: Option<InlineStr>,
    /// Extracted result fields; all absent unless the job succeeded.
    pub result: HashMap<InlineStr, Option<Object>>,
    /// Status queries issued, failed ones included.
    pub polls: u32,
    pub elapsed_ms: i64,
}

/// Waits for remote jobs within a fixed time budget.
///
/// The budget is measured from the job's start and is never extended, not by network errors
/// and not by statuses the vocabulary does not know. Reaching it ends the wait as
/// `JobState::TimedOut`, which is an outcome, not an error.
pub struct JobPoller<'a> {
    client: &'a dyn RemoteJobClient,
    clock: SharedClock,
    properties: JobPollerProperties,
    extractor: ResultExtractor,
}

impl<'a> JobPoller<'a> {
    pub fn new(
        client: &'a dyn RemoteJobClient,
        clock: SharedClock,
        properties: JobPollerProperties,
        extractor: ResultExtractor,
    ) -> Self {
        Self {
            client,
            clock,
            properties,
            extractor,
        }
    }

    pub fn start(&self, job_definition_id: &str, payload: Value) -> CareResult<ExternalJob> {
        let job_id = self.client.start(job_definition_id, &payload)?;
        info!("Started remote job {} of {}", job_id, job_definition_id);
        Ok(ExternalJob::new(
            job_id,
            job_definition_id.into(),
            payload,
            self.clock.now_millis(),
        ))
    }

    /// Polls `job` until it reaches a terminal state. When a lease keeper is given, the task
    /// lease is kept alive before every poll, long enough to outlast the sleep that follows.
    pub fn wait(&self, job: &mut ExternalJob, mut keeper: Option<&mut LeaseKeeper<'_>>) -> JobOutcome {
        let budget = self.properties.timeout_ms;
        let interval = self.properties.poll_interval_ms;
        let mut polls = 0u32;

        loop {
            let elapsed = self.clock.now_millis() - job.started_at;
            if elapsed >= budget {
                warn!(
                    "Remote job {} timed out after {}ms and {} polls",
                    job.job_id, elapsed, polls
                );
                let message = format!("no terminal status within {}ms", budget);
                return self.finish(job, JobState::TimedOut, Some(message.into()), None, polls);
            }

            if let Some(keeper) = keeper.as_mut() {
                keeper.keep_alive_for(interval.min(budget - elapsed));
            }

            polls += 1;
            Monitors::record_job_poll(&job.job_definition_id);
            match self.client.status(&job.job_id) {
                Ok(status) => match StatusMapper::lookup(&status.status) {
                    Some(JobState::Succeeded) => {
                        let result = self.extractor.extract(&status.payload);
                        return self.finish(job, JobState::Succeeded, None, Some(result), polls);
                    }
                    Some(JobState::Failed) => {
                        let message = status
                            .error_message
                            .clone()
                            .unwrap_or_else(|| InlineStr::from("unknown error"));
                        return self.finish(job, JobState::Failed, Some(message), None, polls);
                    }
                    Some(_) => debug!(
                        "Remote job {} is {} after {}ms",
                        job.job_id, status.status, elapsed
                    ),
                    None => {
                        warn!(
                            "Remote job {} reports unmapped status '{}', still waiting",
                            job.job_id, status.status
                        );
                        Monitors::record_unmapped_status(&status.status);
                    }
                },
                Err(e) => {
                    error!("Status query for remote job {} failed: {}", job.job_id, e);
                    Monitors::record_job_poll_error(&job.job_definition_id);
                }
            }

            let remaining = budget - (self.clock.now_millis() - job.started_at);
            self.clock.sleep(interval.min(remaining));
        }
    }

    fn finish(
        &self,
        job: &mut ExternalJob,
        state: JobState,
        message: Option<InlineStr>,
        result: Option<HashMap<InlineStr, Option<Object>>>,
        polls: u32,
    ) -> JobOutcome {
        let state = job.transition(state);
        let elapsed_ms = self.clock.now_millis() - job.started_at;
        info!(
            "Remote job {} ended {} after {}ms and {} polls",
            job.job_id, state, elapsed_ms, polls
        );
        Monitors::record_job_terminal(&job.job_definition_id, state, elapsed_ms);
        JobOutcome {
            state,
            message,
            result: result.unwrap_or_else(|| self.extractor.absent()),
            polls,
            elapsed_ms,
        }
    }
}

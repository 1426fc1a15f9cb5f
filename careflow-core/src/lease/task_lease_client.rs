use careflow_common::prelude::*;
use careflow_common::{Task, TaskOutcome, TaskOutcomeKind};

use crate::broker::{TaskBroker, TopicRequest};
use crate::config::WorkerProperties;
use crate::metrics::Monitors;
use crate::utils::SharedClock;

/// The worker side of the lease protocol: claims tasks for one worker id and reports exactly
/// one outcome per claim.
///
/// Report failures are logged and returned, never swallowed. A report against a lease the worker
/// no longer holds fails with `ErrorCode::LeaseExpired`.
pub struct TaskLeaseClient {
    broker: Arc<dyn TaskBroker>,
    clock: SharedClock,
    properties: WorkerProperties,
}

impl TaskLeaseClient {
    pub fn new(broker: Arc<dyn TaskBroker>, clock: SharedClock, properties: WorkerProperties) -> Self {
        Self {
            broker,
            clock,
            properties,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.properties.worker_id
    }

    pub fn properties(&self) -> &WorkerProperties {
        &self.properties
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Claims up to `max_tasks` tasks on `topics`, each leased for `lease_duration_ms`. An empty
    /// list means there is nothing to do.
    pub fn poll(&self, topics: &[&str], max_tasks: i32, lease_duration_ms: i64) -> CareResult<Vec<Task>> {
        let requests = topics
            .iter()
            .map(|x| TopicRequest::new(*x, lease_duration_ms))
            .collect::<Vec<_>>();
        self.poll_topics(&requests, max_tasks)
    }

    /// Like `poll`, with a lease duration per topic.
    pub fn poll_topics(&self, topics: &[TopicRequest], max_tasks: i32) -> CareResult<Vec<Task>> {
        for topic in topics {
            Monitors::record_task_poll(&topic.topic_name);
        }
        match self
            .broker
            .fetch_and_lock(&self.properties.worker_id, max_tasks, topics)
        {
            Ok(tasks) => {
                for topic in topics {
                    let claimed = tasks
                        .iter()
                        .filter(|x| x.topic == topic.topic_name)
                        .count();
                    if claimed > 0 {
                        Monitors::record_task_poll_count(&topic.topic_name, claimed);
                    }
                }
                Ok(tasks)
            }
            Err(e) => {
                for topic in topics {
                    Monitors::record_task_poll_error(&topic.topic_name);
                }
                Err(e)
            }
        }
    }

    /// Reports success and hands `result_variables` to the process.
    pub fn complete(&self, task: &Task, result_variables: &HashMap<InlineStr, Object>) -> CareResult<()> {
        self.ensure_leased(task, TaskOutcomeKind::Success)?;
        let result = self
            .broker
            .complete(&self.properties.worker_id, &task.id, result_variables);
        self.reported(task, TaskOutcomeKind::Success, result)
    }

    /// Reports a failed attempt. `retries` is the budget left on the task: 0 raises an incident
    /// at once, anything else has the broker offer the task again after `retry_delay_ms`.
    pub fn fail(&self, task: &Task, message: &str, retries: i32, retry_delay_ms: i64) -> CareResult<()> {
        self.ensure_leased(task, TaskOutcomeKind::BusinessFailure)?;
        let result = self.broker.failure(
            &self.properties.worker_id,
            &task.id,
            message,
            "",
            retries,
            retry_delay_ms,
        );
        self.reported(task, TaskOutcomeKind::BusinessFailure, result)
    }

    /// Raises an incident: a failure with no retries left, so an operator has to look at it.
    pub fn incident(&self, task: &Task, message: &str, details: &str) -> CareResult<()> {
        self.ensure_leased(task, TaskOutcomeKind::Incident)?;
        let result = self
            .broker
            .failure(&self.properties.worker_id, &task.id, message, details, 0, 0);
        self.reported(task, TaskOutcomeKind::Incident, result)
    }

    pub fn report(&self, task: &Task, outcome: &TaskOutcome) -> CareResult<()> {
        match outcome {
            TaskOutcome::Success { result_variables } => self.complete(task, result_variables),
            TaskOutcome::BusinessFailure {
                message,
                retries_remaining,
                retry_delay_ms,
            } => self.fail(task, message, *retries_remaining, *retry_delay_ms),
            TaskOutcome::Incident { message, details } => self.incident(task, message, details),
        }
    }

    /// Moves the lease expiry to now + `extension_ms`, on the broker and on `task`.
    pub fn extend_lease(&self, task: &mut Task, extension_ms: i64) -> CareResult<()> {
        let now = self.clock.now_millis();
        match self
            .broker
            .extend_lock(&self.properties.worker_id, &task.id, extension_ms)
        {
            Ok(()) => {
                task.lease_expiry = now + extension_ms;
                Monitors::record_task_extend_lease(&task.topic);
                debug!("Extended lease of task {} to {}", task.id, task.lease_expiry);
                Ok(())
            }
            Err(e) => {
                warn!("Could not extend lease of task {}: {}", task.id, e);
                Err(e)
            }
        }
    }

    /// Retry budget to report with a business failure of `task`: one less than the task has
    /// left, or the configured budget on its first failure.
    pub fn next_retries(&self, task: &Task) -> i32 {
        match task.retries {
            Some(retries) => (retries - 1).max(0),
            None => self.properties.retries,
        }
    }

    /// Refuses a report once the lease is over by the local clock, whether or not the broker
    /// would still accept it.
    fn ensure_leased(&self, task: &Task, kind: TaskOutcomeKind) -> CareResult<()> {
        let now = self.clock.now_millis();
        if !task.is_lease_expired(now) {
            return Ok(());
        }
        warn!(
            "Not reporting {} for task {} on {}: lease expired {}ms ago",
            kind,
            task.id,
            task.topic,
            now - task.lease_expiry
        );
        Monitors::record_task_report_error(&task.topic, kind);
        fmt_err!(
            LeaseExpired,
            "lease of task {} expired at {}, now {}",
            task.id,
            task.lease_expiry,
            now
        )
    }

    fn reported(&self, task: &Task, kind: TaskOutcomeKind, result: CareResult<()>) -> CareResult<()> {
        match result {
            Ok(()) => {
                debug!("Reported {} for task {} on {}", kind, task.id, task.topic);
                Monitors::record_task_outcome(&task.topic, kind);
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Reporting {} for task {} on {} failed: {}",
                    kind,
                    task.id,
                    task.topic,
                    e
                );
                Monitors::record_task_report_error(&task.topic, kind);
                Err(e)
            }
        }
    }
}

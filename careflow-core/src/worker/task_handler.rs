use careflow_common::prelude::*;
use careflow_common::{Task, TaskOutcome};

use crate::config::WorkerProperties;
use crate::lease::{LeaseKeeper, TaskLeaseClient};
use crate::utils::SharedClock;

/// Executes the technical operation behind one topic.
///
/// A handler decides the outcome but never reports it; the worker loop reports exactly one
/// outcome for every claimed task. An `Err` becomes an incident carrying its code.
pub trait TaskHandler: Send + Sync {
    fn topic(&self) -> &str;

    /// Lease to request for this topic, instead of the worker's default.
    fn lock_duration_ms(&self) -> Option<i64> {
        None
    }

    /// Tasks to claim per poll, instead of the worker's default.
    fn max_tasks(&self) -> Option<i32> {
        None
    }

    fn handle(&self, ctx: &mut TaskContext<'_>) -> CareResult<TaskOutcome>;
}

/// One topic bound to its handler, with the claim parameters resolved.
#[derive(Clone)]
pub struct Subscription {
    pub topic: InlineStr,
    pub lock_duration_ms: i64,
    pub max_tasks: i32,
    pub handler: Arc<dyn TaskHandler>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("lock_duration_ms", &self.lock_duration_ms)
            .field("max_tasks", &self.max_tasks)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub fn new(handler: Arc<dyn TaskHandler>, properties: &WorkerProperties) -> Self {
        Self {
            topic: handler.topic().into(),
            lock_duration_ms: handler
                .lock_duration_ms()
                .unwrap_or(properties.lock_duration_ms),
            max_tasks: handler.max_tasks().unwrap_or(properties.max_tasks),
            handler,
        }
    }
}

/// What a handler sees of the task it is working on.
pub struct TaskContext<'a> {
    task: &'a mut Task,
    client: &'a TaskLeaseClient,
}

impl<'a> TaskContext<'a> {
    pub fn new(task: &'a mut Task, client: &'a TaskLeaseClient) -> Self {
        Self { task, client }
    }

    pub fn task(&self) -> &Task {
        &*self.task
    }

    pub fn worker_id(&self) -> &str {
        self.client.worker_id()
    }

    pub fn clock(&self) -> &SharedClock {
        self.client.clock()
    }

    /// Retry budget for a business failure of this attempt.
    pub fn next_retries(&self) -> i32 {
        self.client.next_retries(&*self.task)
    }

    /// A retryable failure with the worker's retry budget and back-off.
    pub fn business_failure(&self, message: impl Into<InlineStr>) -> TaskOutcome {
        TaskOutcome::business_failure(
            message,
            self.next_retries(),
            self.client.properties().retry_timeout_ms,
        )
    }

    pub fn extend_lease(&mut self, extension_ms: i64) -> CareResult<()> {
        self.client.extend_lease(self.task, extension_ms)
    }

    /// Keeps the lease alive in `extension_ms` steps while the handler waits on a slow
    /// dependency.
    pub fn lease_keeper(&mut self, extension_ms: i64) -> LeaseKeeper<'_> {
        LeaseKeeper::new(self.client, &mut *self.task, extension_ms)
    }
}

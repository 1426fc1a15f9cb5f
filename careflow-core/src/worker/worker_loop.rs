use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use careflow_common::prelude::*;
use careflow_common::{Task, TaskOutcome};

use super::{ShutdownSignal, Subscription, TaskContext, TaskHandler};
use crate::lease::TaskLeaseClient;
use crate::metrics::Monitors;

/// Poll loop of one worker.
///
/// A cycle polls every subscribed topic once, in subscription order, and runs the claimed tasks
/// synchronously. A failed poll moves on to the next topic. A cycle that handled nothing is
/// followed by the idle interval, slept on the client's clock.
pub struct WorkerLoop {
    client: TaskLeaseClient,
    subscriptions: Vec<Subscription>,
    shutdown: ShutdownSignal,
}

impl WorkerLoop {
    pub fn new(client: TaskLeaseClient, shutdown: ShutdownSignal) -> Self {
        Self {
            client,
            subscriptions: Vec::new(),
            shutdown,
        }
    }

    pub fn subscribe(&mut self, handler: Arc<dyn TaskHandler>) -> CareResult<()> {
        let subscription = Subscription::new(handler, self.client.properties());
        if subscription.topic.is_empty() {
            return str_err!(IllegalArgument, "handler topic must not be empty");
        }
        if self
            .subscriptions
            .iter()
            .any(|x| x.topic == subscription.topic)
        {
            return fmt_err!(
                Conflict,
                "topic {} already has a handler on worker {}",
                subscription.topic,
                self.client.worker_id()
            );
        }
        info!(
            "Worker {} subscribed to {} (lock {}ms, batch {})",
            self.client.worker_id(),
            subscription.topic,
            subscription.lock_duration_ms,
            subscription.max_tasks
        );
        self.subscriptions.push(subscription);
        Ok(())
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    pub fn client(&self) -> &TaskLeaseClient {
        &self.client
    }

    /// One cycle over all topics. Returns the number of tasks handled.
    pub fn run_once(&self) -> usize {
        let mut handled = 0;
        for subscription in &self.subscriptions {
            if self.shutdown.is_raised() {
                break;
            }
            let tasks = match self.client.poll(
                &[subscription.topic.as_str()],
                subscription.max_tasks,
                subscription.lock_duration_ms,
            ) {
                Ok(tasks) => tasks,
                Err(e) => {
                    error!("Polling {} failed: {}", subscription.topic, e);
                    continue;
                }
            };
            if tasks.is_empty() {
                trace!("No task on {}", subscription.topic);
            }
            for task in tasks {
                self.execute(subscription, task);
                handled += 1;
            }
        }
        handled
    }

    /// Runs cycles until the shutdown signal is raised.
    pub fn run(&self) {
        let idle = self.client.properties().idle_interval_ms;
        info!(
            "Worker {} started on {:?}",
            self.client.worker_id(),
            self.subscriptions
                .iter()
                .map(|x| x.topic.as_str())
                .collect::<Vec<_>>()
        );
        while !self.shutdown.is_raised() {
            if self.run_once() == 0 && self.shutdown.wait(self.client.clock().as_ref(), idle) {
                break;
            }
        }
        info!("Worker {} stopped", self.client.worker_id());
    }

    /// Runs the loop on a thread of its own, named after the worker.
    pub fn spawn(self) -> CareResult<WorkerHandle> {
        let name = InlineStr::from(self.client.worker_id());
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || self.run())?;
        Ok(WorkerHandle { name, handle })
    }

    fn execute(&self, subscription: &Subscription, mut task: Task) {
        debug!(
            "Task {} on {} claimed until {}",
            task.id, task.topic, task.lease_expiry
        );
        let started = self.client.clock().now_millis();

        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = TaskContext::new(&mut task, &self.client);
            subscription.handler.handle(&mut ctx)
        }));
        let outcome = match handled {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Handler for {} failed on task {}: {}", task.topic, task.id, e);
                TaskOutcome::from_error(&e)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|x| x.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                error!("Handler for {} panicked on task {}: {}", task.topic, task.id, message);
                Monitors::record_handler_panic(&task.topic);
                TaskOutcome::from_error(&ErrorCode::HandlerPanicked(message))
            }
        };
        Monitors::record_task_execution_time(
            &task.topic,
            self.client.clock().now_millis() - started,
        );

        // report failures were already logged by the client
        if let Err(e) = self.client.report(&task, &outcome) {
            debug!("Outcome of task {} was not recorded: {}", task.id, e);
        }
    }
}

/// A worker loop running on its own thread.
pub struct WorkerHandle {
    name: InlineStr,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn join(self) -> CareResult<()> {
        match self.handle.join() {
            Ok(()) => Ok(()),
            Err(_) => fmt_err!(UnknownException, "worker {} thread panicked", self.name),
        }
    }
}

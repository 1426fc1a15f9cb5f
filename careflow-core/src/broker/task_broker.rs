use careflow_common::prelude::*;
use careflow_common::Task;

/// One topic of a fetch-and-lock request.
#[derive(Clone, Debug)]
pub struct TopicRequest {
    pub topic_name: InlineStr,
    /// Lease granted on every task claimed for this topic.
    pub lock_duration_ms: i64,
}

impl TopicRequest {
    pub fn new(topic_name: impl Into<InlineStr>, lock_duration_ms: i64) -> Self {
        Self {
            topic_name: topic_name.into(),
            lock_duration_ms,
        }
    }
}

/// The engine side of the external-task protocol.
///
/// The broker is the only arbiter of lease ownership: it never hands the same task to two
/// workers at once, and it rejects reports and extensions from a worker whose lease is gone
/// with `ErrorCode::LeaseExpired`.
pub trait TaskBroker: Send + Sync {
    /// Claims up to `max_tasks` tasks across `topics`. An empty result is the normal idle case.
    fn fetch_and_lock(
        &self,
        worker_id: &str,
        max_tasks: i32,
        topics: &[TopicRequest],
    ) -> CareResult<Vec<Task>>;

    /// Finishes the task and merges `variables` into the process.
    fn complete(
        &self,
        worker_id: &str,
        task_id: &str,
        variables: &HashMap<InlineStr, Object>,
    ) -> CareResult<()>;

    /// Records a failed attempt. `retries` is the remaining budget stored on the task; 0 raises
    /// an incident, anything else offers the task again after `retry_timeout_ms`.
    fn failure(
        &self,
        worker_id: &str,
        task_id: &str,
        error_message: &str,
        error_details: &str,
        retries: i32,
        retry_timeout_ms: i64,
    ) -> CareResult<()>;

    /// Moves the lease expiry to now + `new_duration_ms`.
    fn extend_lock(&self, worker_id: &str, task_id: &str, new_duration_ms: i64)
        -> CareResult<()>;
}
